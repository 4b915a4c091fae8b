use crate::session::Session;
use crate::{GlobalArgs, ScopeArgs};
use anyhow::bail;
use colored::Colorize;
use hcsync_core::ResourceKind;

pub async fn handle(
    global: &GlobalArgs,
    scope: &ScopeArgs,
    resource: ResourceKind,
    lb_id: Option<&str>,
) -> anyhow::Result<()> {
    match resource {
        ResourceKind::SubAccount
        | ResourceKind::Region
        | ResourceKind::SecurityGroupRule
        | ResourceKind::Rule
        | ResourceKind::Target => {
            bail!("{} has no sweep; a full sync removes stale rows", resource)
        }
        ResourceKind::Listener if lb_id.is_none() => bail!("sweep listener requires --lb-id"),
        _ => {}
    }
    println!("{}", format!("Sweeping {}...", resource).blue());

    let session = Session::open(global, scope).await?;
    let client = &session.client;
    let kit = &session.kit;
    let (account, region) = (scope.account.as_str(), scope.region.as_str());

    let outcome = session
        .bounded(async {
            match resource {
                ResourceKind::Vpc => {
                    client.remove_vpc_deleted_from_cloud(kit, account, region).await
                }
                ResourceKind::Subnet => {
                    client.remove_subnet_deleted_from_cloud(kit, account, region).await
                }
                ResourceKind::SecurityGroup => {
                    client
                        .remove_security_group_deleted_from_cloud(kit, account, region)
                        .await
                }
                ResourceKind::ArgumentTemplate => {
                    client
                        .remove_argument_template_deleted_from_cloud(kit, account, region)
                        .await
                }
                ResourceKind::Image => {
                    client.remove_image_deleted_from_cloud(kit, account, region).await
                }
                ResourceKind::Disk => {
                    client.remove_disk_deleted_from_cloud(kit, account, region).await
                }
                ResourceKind::Eip => {
                    client.remove_eip_deleted_from_cloud(kit, account, region).await
                }
                ResourceKind::Cvm => {
                    client.remove_cvm_deleted_from_cloud(kit, account, region).await
                }
                ResourceKind::RouteTable => {
                    client
                        .remove_route_table_deleted_from_cloud(kit, account, region)
                        .await
                }
                ResourceKind::Route => {
                    client.remove_route_deleted_from_cloud(kit, account, region).await
                }
                ResourceKind::LoadBalancer => {
                    client
                        .remove_load_balancer_deleted_from_cloud(kit, account, region)
                        .await
                }
                ResourceKind::Listener => {
                    let lb_id = lb_id.unwrap_or_default();
                    client
                        .remove_listener_deleted_from_cloud(kit, account, region, lb_id)
                        .await
                }
                ResourceKind::TargetGroup => {
                    client
                        .remove_target_group_deleted_from_cloud(kit, account, region)
                        .await
                }
                ResourceKind::SubAccount
                | ResourceKind::Region
                | ResourceKind::SecurityGroupRule
                | ResourceKind::Rule
                | ResourceKind::Target => Ok(()),
            }
        })
        .await;
    session.close().await?;

    outcome?;
    println!("{} {}", "✓".green().bold(), format!("{} swept", resource).cyan());
    Ok(())
}
