use super::print_result;
use crate::session::Session;
use crate::{GlobalArgs, ScopeArgs};
use anyhow::bail;
use colored::Colorize;
use hcsync_core::ResourceKind;
use hcsync_core::model::CvmRelKind;
use hcsync_sync::{CvmRelOption, SyncBaseParams, SyncDiskOption};

pub struct SyncTarget {
    pub resource: ResourceKind,
    pub cloud_ids: Vec<String>,
    pub lb_id: Option<String>,
    pub security_group_id: Option<String>,
    pub boot_disk_ids: Vec<String>,
}

impl SyncTarget {
    /// Reject invocations that cannot run before touching the store
    fn check(&self) -> anyhow::Result<()> {
        match self.resource {
            ResourceKind::Rule | ResourceKind::Target => {
                bail!(
                    "{} is synced through its listener; use `sync listener --lb-id <ID>` or `sync-lb`",
                    self.resource
                )
            }
            ResourceKind::Listener if self.lb_id.is_none() => {
                bail!("sync listener requires --lb-id")
            }
            ResourceKind::SecurityGroupRule if self.security_group_id.is_none() => {
                bail!("sync security-group-rule requires --security-group-id")
            }
            _ => Ok(()),
        }
    }
}

pub async fn handle(
    global: &GlobalArgs,
    scope: &ScopeArgs,
    target: SyncTarget,
) -> anyhow::Result<()> {
    target.check()?;
    println!("{}", format!("Syncing {}...", target.resource).blue());

    let session = Session::open(global, scope).await?;
    let params = SyncBaseParams::new(&scope.account, &scope.region)
        .with_cloud_ids(target.cloud_ids.iter().cloned());
    let client = &session.client;
    let kit = &session.kit;

    let outcome = session
        .bounded(async {
            match target.resource {
                ResourceKind::SubAccount => client.sync_sub_account(kit, &params.cloud_ids).await,
                ResourceKind::Region => client.sync_region(kit).await,
                ResourceKind::Vpc => client.sync_vpc(kit, &params).await,
                ResourceKind::Subnet => client.sync_subnet(kit, &params).await,
                ResourceKind::SecurityGroup => client.sync_security_group(kit, &params).await,
                ResourceKind::SecurityGroupRule => {
                    let group = target.security_group_id.as_deref().unwrap_or_default();
                    client.sync_security_group_rule(kit, &params, group).await
                }
                ResourceKind::ArgumentTemplate => {
                    client.sync_argument_template(kit, &params).await
                }
                ResourceKind::Image => client.sync_image(kit, &params).await,
                ResourceKind::Disk => {
                    let option = SyncDiskOption {
                        boot_disk_ids: target.boot_disk_ids.iter().cloned().collect(),
                    };
                    client.sync_disk(kit, &params, &option).await
                }
                ResourceKind::Eip => client.sync_eip(kit, &params).await,
                ResourceKind::Cvm => client.sync_cvm(kit, &params).await,
                ResourceKind::RouteTable => client.sync_route_table(kit, &params).await,
                ResourceKind::Route => client.sync_route(kit, &params).await,
                ResourceKind::LoadBalancer => client.sync_load_balancer(kit, &params).await,
                ResourceKind::Listener => {
                    let lb_id = target.lb_id.as_deref().unwrap_or_default();
                    client.sync_listener(kit, &params, lb_id).await
                }
                ResourceKind::TargetGroup => client.sync_target_group(kit, &params).await,
                ResourceKind::Rule | ResourceKind::Target => Ok(Default::default()),
            }
        })
        .await;
    session.close().await?;

    print_result(target.resource.as_str(), &outcome?);
    Ok(())
}

pub async fn handle_lb(
    global: &GlobalArgs,
    scope: &ScopeArgs,
    cloud_ids: Vec<String>,
) -> anyhow::Result<()> {
    println!(
        "{}",
        "Syncing load balancers with listeners, rules and backends...".blue()
    );

    let session = Session::open(global, scope).await?;
    let params = SyncBaseParams::new(&scope.account, &scope.region).with_cloud_ids(cloud_ids);
    let outcome = session
        .bounded(session.client.sync_load_balancer_with_rel(&session.kit, &params))
        .await;
    session.close().await?;

    print_result("load_balancer", &outcome?);
    Ok(())
}

pub async fn handle_cvm_rel(
    global: &GlobalArgs,
    scope: &ScopeArgs,
    cloud_ids: Vec<String>,
    kinds: Vec<CvmRelKind>,
) -> anyhow::Result<()> {
    println!("{}", "Syncing instances with related resources...".blue());

    let session = Session::open(global, scope).await?;
    let option = if kinds.is_empty() {
        CvmRelOption::for_vendor(session.client.vendor)
    } else {
        CvmRelOption { kinds }
    };
    let params = SyncBaseParams::new(&scope.account, &scope.region).with_cloud_ids(cloud_ids);
    let outcome = session
        .bounded(session.client.sync_cvm_with_rel_res(&session.kit, &params, &option))
        .await;
    session.close().await?;

    print_result("cvm", &outcome?);
    Ok(())
}
