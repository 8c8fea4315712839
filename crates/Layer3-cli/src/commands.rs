//! Subcommand implementations

use crate::WorkspaceAction;
use anyhow::{bail, Context};
use qavm_core::{
    CancellationToken, DiscoveryContext, HandlerScan, LoadReport, PluginSigner, ViewKind, Workspace,
};
use qavm_foundation::Error;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

// ============================================================================
// plugins
// ============================================================================

pub fn plugins(ctx: &DiscoveryContext, report: &LoadReport, json: bool) -> anyhow::Result<()> {
    let manager = ctx.manager();

    if json {
        let plugins: Vec<_> = manager
            .plugins()
            .iter()
            .map(|p| {
                serde_json::json!({
                    "metadata": p.metadata(),
                    "origin": p.origin(),
                    "path": p.path(),
                    "software": p.software_handlers().map(|h| h.uid()).collect::<Vec<_>>(),
                })
            })
            .collect();
        let rejected: Vec<_> = report
            .rejected
            .iter()
            .map(|r| serde_json::json!({ "path": r.path, "stage": r.stage.to_string(), "reason": r.reason }))
            .collect();
        let out = serde_json::json!({
            "plugins": plugins,
            "pending": manager.pending_plugins(),
            "rejected": rejected,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let summary = manager.summary();
    println!(
        "{} plugins, {} software handlers, {} pending, {} rejected\n",
        summary.plugins,
        summary.software_handlers,
        summary.pending,
        report.rejected.len()
    );
    for plugin in manager.plugins() {
        println!(
            "{} v{} [{}] {}",
            plugin.id(),
            plugin.version(),
            plugin.origin(),
            plugin.metadata().display_name()
        );
        for handler in plugin.software_handlers() {
            println!("  {} - {}", handler.uid(), handler.name());
        }
    }
    for id in manager.pending_plugins() {
        println!("{} [pending: run with --trust-user-plugins to load]", id);
    }
    for rejection in &report.rejected {
        println!("rejected {}", rejection);
    }
    Ok(())
}

// ============================================================================
// scan
// ============================================================================

pub async fn scan(ctx: DiscoveryContext, software: Option<String>, json: bool) -> anyhow::Result<()> {
    let token = CancellationToken::new();

    // Ctrl-C → 스캔 취소
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling scan");
            interrupt.cancel();
        }
    });

    let ctx = Arc::new(ctx);
    let worker = Arc::clone(&ctx);
    let result = tokio::task::spawn_blocking(move || -> qavm_foundation::Result<BTreeMap<String, HandlerScan>> {
        match software {
            Some(uid) => {
                let found = worker.scan_software(&uid, &token)?;
                Ok(BTreeMap::from([(uid, found)]))
            }
            None => worker.scan_all(&token),
        }
    })
    .await?;

    let results = match result {
        Ok(results) => results,
        Err(Error::Cancelled) => bail!("scan cancelled"),
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    let data = ctx.descriptor_data();
    let mut total = 0;
    for (software, by_type) in &results {
        for (type_key, descriptors) in by_type {
            println!("{} ({}): {} found", software, type_key, descriptors.len());
            for d in descriptors {
                total += 1;
                let version = d.version().map(|v| format!(" {v}")).unwrap_or_default();
                let link = if d.link_type().is_link() {
                    format!(" [{}]", d.link_type())
                } else {
                    String::new()
                };
                let extra = data.get(d.uid());
                let tags = if extra.tags.is_empty() {
                    String::new()
                } else {
                    format!(" #{}", extra.tags.join(" #"))
                };
                println!("  {}{}{}{}  {}", d.name(), version, link, tags, d.path().display());
                println!("    uid {}", d.uid());
            }
        }
    }
    info!("{} installations found", total);
    Ok(())
}

// ============================================================================
// workspace
// ============================================================================

pub fn workspace(ctx: &DiscoveryContext, action: WorkspaceAction, json: bool) -> anyhow::Result<()> {
    match action {
        WorkspaceAction::List => {
            for name in ctx.workspaces().list() {
                println!("{}", name);
            }
        }
        WorkspaceAction::Save { name } => {
            let workspace = Workspace::from_manager(name.as_str(), ctx.manager());
            ctx.workspaces().save(&workspace)?;
            println!("Saved workspace {}", name);
        }
        WorkspaceAction::Remove { name } => {
            ctx.workspaces().remove(&name)?;
            println!("Removed workspace {}", name);
        }
        WorkspaceAction::Show { name } => {
            let workspace = match name {
                Some(name) => ctx.workspaces().load(&name)?,
                None => ctx.active_workspace()?,
            };
            let (handlers, unresolved) = workspace.get_involved_software_handlers(ctx.manager());

            if json {
                let out = serde_json::json!({
                    "name": workspace.name(),
                    "workspace": workspace,
                    "handlers": handlers.iter().map(|h| h.uid()).collect::<Vec<_>>(),
                    "unresolved": unresolved,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }

            println!("Workspace {}", workspace.name());
            for kind in ViewKind::ALL {
                for uid in workspace.views(kind) {
                    println!("  {:<6} {}", kind.as_str(), uid);
                }
            }
            for uid in workspace.menu_items() {
                println!("  {:<6} {}", "menu", uid);
            }
            println!("Handlers:");
            for handler in &handlers {
                println!("  {} - {}", handler.uid(), handler.name());
            }
            if !unresolved.is_empty() {
                println!("Unresolved:");
                for uid in &unresolved {
                    println!("  {}", uid);
                }
            }
        }
    }
    Ok(())
}

// ============================================================================
// sign
// ============================================================================

pub fn sign(folder: &Path, key: &Path) -> anyhow::Result<()> {
    let pkcs8 = std::fs::read(key).with_context(|| format!("reading key {}", key.display()))?;
    let signer = PluginSigner::from_pkcs8(&pkcs8)?;
    let sig = signer.sign_folder(folder)?;
    println!("Wrote {}", sig.display());
    Ok(())
}

// ============================================================================
// descriptor data
// ============================================================================

pub fn tag(ctx: &DiscoveryContext, uid: &str, tag: &str, remove: bool) -> anyhow::Result<()> {
    let data = ctx.descriptor_data();
    let changed = if remove {
        data.remove_tag(uid, tag)
    } else {
        data.add_tag(uid, tag)
    };
    if changed {
        data.save()?;
    }
    println!("{}: {}", uid, data.get(uid).tags.join(", "));
    Ok(())
}

pub fn note(ctx: &DiscoveryContext, uid: &str, visible: &str, note: &str) -> anyhow::Result<()> {
    let data = ctx.descriptor_data();
    data.set_note(uid, visible, note);
    data.save()?;
    Ok(())
}

pub fn tags(ctx: &DiscoveryContext, tag: Option<&str>) -> anyhow::Result<()> {
    let data = ctx.descriptor_data();
    match tag {
        Some(tag) => {
            for uid in data.uids_with_tag(tag) {
                println!("{}", uid);
            }
        }
        None => {
            for tag in data.all_tags() {
                println!("{}", tag);
            }
        }
    }
    Ok(())
}
