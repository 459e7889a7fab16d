use anyhow::Context;
use clap::Parser;
use port_portal::config::cli::{
    Cli, Command, FileCommand, InviteCommand, ReportArgs, ReportCommand, VesselCommand,
    WeeklyCommand,
};
use port_portal::core::{ReportEngine, VesselReportPipeline, WeeklyReportPipeline};
use port_portal::domain::model::Role;
use port_portal::services::invitations::{HodInvite, InvitationService, PortInvite};
use port_portal::services::{
    FileService, SessionService, VesselCallDraft, VesselService, WeeklyService, WeeklySubmission,
};
use port_portal::utils::error::ErrorSeverity;
use port_portal::utils::{logger, validation::Validate};
use port_portal::{AnyStore, PortalConfig, PortalError};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);
    tracing::info!("Starting portal CLI");

    if let Err(e) = run(cli).await {
        let Some(portal_error) = e.downcast_ref::<PortalError>() else {
            tracing::error!("❌ {:#}", e);
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        };

        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            portal_error,
            portal_error.category(),
            portal_error.severity()
        );
        eprintln!("❌ {}", portal_error.user_friendly_message());
        eprintln!("💡 建議: {}", portal_error.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match portal_error.severity() {
            ErrorSeverity::Low => 4,      // 輸入被拒
            ErrorSeverity::Medium => 2,   // 可重試
            ErrorSeverity::High => 1,     // 處理錯誤
            ErrorSeverity::Critical => 3, // 設定或系統錯誤
        };
        std::process::exit(exit_code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = PortalConfig::from_file(&cli.config)?;
    if cli.verbose {
        tracing::debug!("Loaded config from {}", cli.config.display());
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        return Err(e.into());
    }

    let store = Arc::new(config.document_store()?);
    let monitor = cli.monitor || config.report.monitoring;
    if monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    match cli.command {
        Command::Report(ReportCommand::Vessels(args)) => {
            let (filter, output) = report_settings(&config, &args)?;
            let pipeline =
                VesselReportPipeline::new(store, config.blob_storage().await?, filter, output);
            print_paths(ReportEngine::new_with_monitoring(pipeline, monitor).run().await?);
        }
        Command::Report(ReportCommand::Weekly(args)) => {
            let (filter, output) = report_settings(&config, &args)?;
            let pipeline =
                WeeklyReportPipeline::new(store, config.blob_storage().await?, filter, output);
            print_paths(ReportEngine::new_with_monitoring(pipeline, monitor).run().await?);
        }
        Command::Invite(invite) => {
            let service = InvitationService::new(
                store,
                config.mailer()?,
                config.invitation_settings()?,
            );
            let invitation = match invite {
                InviteCommand::Port { name, email, location } => {
                    service.invite_port(PortInvite { name, email, location }).await?
                }
                InviteCommand::Hod { name, email, department } => {
                    service.invite_hod(HodInvite { name, email, department }).await?
                }
            };
            println!("✉️  Invitation sent to {} ({})", invitation.email, invitation.role.as_str());
            println!("🔗 {}", invitation.link);
        }
        Command::AcceptInvite { token, password } => {
            let service = InvitationService::new(
                store.clone(),
                config.mailer()?,
                config.invitation_settings()?,
            );
            let (role, doc) = service.find_invitation(&token).await?;
            let email = doc
                .text(&["email"])
                .context("Invitation has no email address")?;

            let session = config.identity_client()?.sign_up(&email, &password).await?;
            // 新帳號的 token 用於後續寫入
            if let AnyStore::Firestore(firestore) = store.as_ref() {
                firestore.set_id_token(Some(session.id_token.clone())).await;
            }
            let profile = service.accept_invitation(&token, &session.local_id).await?;
            println!(
                "✅ Account {} created with role {}",
                profile.email,
                role_label(profile.role)
            );
        }
        Command::Vessel(command) => {
            let service = VesselService::new(store);
            match command {
                VesselCommand::Register { file } => {
                    let raw = tokio::fs::read_to_string(&file)
                        .await
                        .with_context(|| format!("Failed to read {}", file.display()))?;
                    let draft: VesselCallDraft = serde_json::from_str(&raw)
                        .with_context(|| format!("{} is not a valid vessel call", file.display()))?;
                    let id = service.register(draft).await?;
                    println!("✅ Vessel call registered: {}", id);
                }
                VesselCommand::Clear { id, date } => {
                    service.issue_clearance(&id, date).await?;
                    println!("✅ Clearance issued for {} on {}", id, date);
                }
                VesselCommand::List { port } => {
                    let selection = port_portal::report::PortSelection::parse(&port);
                    let vessels = service.list(&selection).await?;
                    for v in &vessels {
                        println!(
                            "{}\t{}\t{}\t{}\t{}",
                            v.id,
                            v.vessel_name,
                            v.port_label(),
                            v.arrival_date().map(|d| d.to_string()).unwrap_or_default(),
                            if v.cleared { "cleared" } else { "pending" }
                        );
                    }
                    println!("{} vessel call(s) for {}", vessels.len(), selection);
                }
            }
        }
        Command::Weekly(WeeklyCommand::Submit { file }) => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let submission: WeeklySubmission = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a valid weekly report", file.display()))?;
            let id = WeeklyService::new(store).submit(submission).await?;
            println!("✅ Weekly report submitted: {}", id);
        }
        Command::File(command) => {
            let service = FileService::new(config.blob_storage().await?, store, config.upload_policy());
            match command {
                FileCommand::Upload { port, path, uploaded_by } => {
                    let bytes = tokio::fs::read(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    let name = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .context("Upload path has no file name")?;
                    let uploaded = service
                        .upload(&port, name, &bytes, uploaded_by.as_deref())
                        .await?;
                    println!("✅ Uploaded {} as {}", uploaded.storage_path, uploaded.id);
                }
                FileCommand::Download { id, out } => {
                    let (file, bytes) = service.download(&id).await?;
                    tokio::fs::write(&out, &bytes)
                        .await
                        .with_context(|| format!("Failed to write {}", out.display()))?;
                    println!("📁 {} saved to {}", file.file_name, out.display());
                }
                FileCommand::Delete { id } => {
                    service.delete(&id).await?;
                    println!("🗑️  Deleted {}", id);
                }
                FileCommand::List { port } => {
                    let files = service.list(port.as_deref()).await?;
                    for f in &files {
                        println!(
                            "{}\t{}\t{}\t{}",
                            f.id,
                            f.port_id.as_deref().unwrap_or("-"),
                            f.file_name,
                            f.size
                        );
                    }
                    println!("{} file(s)", files.len());
                }
            }
        }
        Command::Login { email, password } => {
            let service = SessionService::new(config.identity_client()?, store)
                .with_cache(config.role_cache())
                .with_retry(config.retry_policy());
            let signed_in = service.login(&email, &password).await?;
            println!(
                "🔐 {} signed in as {}{}",
                signed_in.session.email,
                role_label(signed_in.profile.role),
                if signed_in.from_cache { " (cached role, offline)" } else { "" }
            );
        }
    }

    Ok(())
}

fn report_settings(
    config: &PortalConfig,
    args: &ReportArgs,
) -> port_portal::Result<(port_portal::report::ReportFilter, port_portal::OutputSettings)> {
    let filter = args.filter()?;
    let mut output = config.output_settings()?;
    if let Some(formats) = args.formats()? {
        output.formats = formats;
    }
    Ok((filter, output))
}

fn print_paths(paths: Vec<String>) {
    println!("✅ Report generated successfully!");
    for path in paths {
        println!("📁 Output saved to: {}", path);
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::Admin => "administrator",
        Role::Port => "port user",
        Role::Hod => "head of department",
    }
}
