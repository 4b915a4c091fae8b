//! Relationship discovery for freshly listed instances

use crate::client::SyncClient;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::{into_chunks, map_by_cloud_id, region_filter};
use hcsync_core::model::{CloudCvm, CvmRelKind, CvmRelation};
use hcsync_core::slice::unique;
use hcsync_core::{Kit, ResourceKind, StoreResource};
use hcsync_gateway::{Expression, Record, Table, list_all};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Cloud ids of everything a set of instances is attached to
pub(crate) struct CvmRelManager {
    region: String,
    cvms: Vec<CloudCvm>,
    /// Public ip -> eip cloud id
    eip_by_ip: HashMap<String, String>,
}

impl CvmRelManager {
    /// Index `cvms`. Instances only report public addresses, so those are
    /// resolved to eip cloud ids here.
    pub async fn build(client: &SyncClient, region: &str, cvms: Vec<CloudCvm>) -> Result<Self> {
        let ips = unique(cvms.iter().flat_map(|c| c.public_ipv4_addresses.iter().cloned()));
        let limit = client.cloud().max_ids_per_call(ResourceKind::Eip).max(1);
        let scope = format!("{}/{}", client.account_id, region);

        let mut eip_by_ip = HashMap::new();
        for chunk in ips.chunks(limit) {
            let eips = client
                .cloud()
                .list_eips_by_public_ip(region, chunk)
                .await
                .map_err(SyncError::cloud_list(ResourceKind::Eip, &scope))?;
            for eip in eips {
                eip_by_ip.entry(eip.public_ip).or_insert(eip.cloud_id);
            }
        }

        Ok(Self {
            region: region.to_string(),
            cvms,
            eip_by_ip,
        })
    }

    pub fn cvm_cloud_ids(&self) -> Vec<String> {
        unique(self.cvms.iter().map(|c| c.cloud_id.clone()))
    }

    pub fn vpc_ids(&self) -> Vec<String> {
        unique(self.cvms.iter().flat_map(|c| c.cloud_vpc_ids.iter().cloned()))
    }

    /// Subnet cloud ids keyed by the VPC of the instance that uses them
    pub fn subnet_ids_by_vpc(&self) -> BTreeMap<String, Vec<String>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for cvm in &self.cvms {
            let vpc = cvm.cloud_vpc_ids.first().cloned().unwrap_or_default();
            let entry = grouped.entry(vpc).or_default();
            for subnet in &cvm.cloud_subnet_ids {
                if !entry.contains(subnet) {
                    entry.push(subnet.clone());
                }
            }
        }
        grouped
    }

    /// Cloud ids of system disks
    pub fn boot_disk_ids(&self) -> HashSet<String> {
        self.cvms
            .iter()
            .filter_map(|c| c.cloud_system_disk_id.clone())
            .collect()
    }

    fn related_of(&self, cvm: &CloudCvm, kind: CvmRelKind) -> Vec<String> {
        match kind {
            CvmRelKind::SecurityGroup => cvm.cloud_security_group_ids.clone(),
            CvmRelKind::Disk => cvm.cloud_disk_ids(),
            CvmRelKind::Eip => cvm
                .public_ipv4_addresses
                .iter()
                .filter_map(|ip| self.eip_by_ip.get(ip).cloned())
                .collect(),
        }
    }

    /// Distinct cloud ids of `kind` across every instance
    pub fn related_ids(&self, kind: CvmRelKind) -> Vec<String> {
        unique(self.cvms.iter().flat_map(|c| self.related_of(c, kind)))
    }

    /// Converge the relation rows of `kind` for the indexed instances
    pub async fn sync_rel(&self, kit: &Kit, client: &SyncClient, kind: CvmRelKind) -> Result<()> {
        let store = client.store();
        let base = region_filter(client, &self.region);
        let res_kind = kind.resource_kind();

        let cvms = map_by_cloud_id(client, store.cvms(), ResourceKind::Cvm, &base, &self.cvm_cloud_ids()).await?;
        let resources = match kind {
            CvmRelKind::SecurityGroup => {
                local_ids(client, store.security_groups(), res_kind, &base, &self.related_ids(kind)).await?
            }
            CvmRelKind::Disk => local_ids(client, store.disks(), res_kind, &base, &self.related_ids(kind)).await?,
            CvmRelKind::Eip => local_ids(client, store.eips(), res_kind, &base, &self.related_ids(kind)).await?,
        };

        let mut wanted: HashSet<(String, String)> = HashSet::new();
        for cloud_cvm in &self.cvms {
            let cvm = cvms.get(&cloud_cvm.cloud_id).ok_or_else(|| {
                SyncError::dependency(ResourceKind::Cvm, &cloud_cvm.cloud_id, &self.region)
            })?;
            for res_cloud_id in self.related_of(cloud_cvm, kind) {
                let res_id = resources
                    .get(&res_cloud_id)
                    .ok_or_else(|| SyncError::dependency(res_kind, &res_cloud_id, &cloud_cvm.cloud_id))?;
                wanted.insert((cvm.id.clone(), res_id.clone()));
            }
        }

        let table = store.cvm_rels(kind);
        let cvm_ids: Vec<String> = cvms.values().map(|c| c.id.clone()).collect();
        let mut stored = Vec::new();
        for chunk in cvm_ids.chunks(client.limits.batch_operation_max_limit) {
            stored.extend(
                list_all(
                    table,
                    &Expression::new().equal("vendor", client.vendor).is_in("cvm_id", chunk),
                    client.limits.default_page_limit,
                )
                .await
                .map_err(SyncError::store_list(res_kind, &self.region))?,
            );
        }

        let existing: HashSet<(String, String)> = stored
            .iter()
            .map(|r| (r.cvm_id.clone(), r.res_id.clone()))
            .collect();
        let stale: Vec<String> = stored
            .iter()
            .filter(|r| !wanted.contains(&(r.cvm_id.clone(), r.res_id.clone())))
            .map(|r| r.id.clone())
            .collect();
        let mut fresh: Vec<CvmRelation> = wanted
            .into_iter()
            .filter(|pair| !existing.contains(pair))
            .map(|(cvm_id, res_id)| CvmRelation {
                id: String::new(),
                vendor: client.vendor,
                cvm_id,
                res_id,
            })
            .collect();
        fresh.sort_by(|a, b| (&a.cvm_id, &a.res_id).cmp(&(&b.cvm_id, &b.res_id)));

        let (deleted, created) = (stale.len(), fresh.len());
        for chunk in into_chunks(stale, client.limits.batch_operation_max_limit) {
            table
                .batch_delete(&Expression::new().is_in("id", &chunk))
                .await
                .map_err(SyncError::store_write(res_kind, StoreOp::Delete))?;
        }
        for chunk in into_chunks(fresh, client.limits.batch_operation_max_limit) {
            table
                .batch_create(chunk)
                .await
                .map_err(SyncError::store_write(res_kind, StoreOp::Create))?;
        }

        if deleted + created > 0 {
            tracing::info!(
                rid = %kit.rid,
                vendor = %client.vendor,
                account_id = %client.account_id,
                region = %self.region,
                kind = %kind,
                created,
                deleted,
                "Synced cvm relations"
            );
        }
        Ok(())
    }
}

/// Cloud id -> local id for rows of `table`
async fn local_ids<R>(
    client: &SyncClient,
    table: &dyn Table<R>,
    kind: ResourceKind,
    base: &Expression,
    cloud_ids: &[String],
) -> Result<HashMap<String, String>>
where
    R: Record + StoreResource,
{
    Ok(map_by_cloud_id(client, table, kind, base, cloud_ids)
        .await?
        .into_iter()
        .map(|(cloud_id, row)| (cloud_id, StoreResource::id(&row).to_string()))
        .collect())
}
