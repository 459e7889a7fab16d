use crate::report::{DateRange, PortSelection, ReportFilter, ReportFormat};
use crate::utils::error::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "portal")]
#[command(about = "Port authority back office: reports, onboarding, vessel calls and files")]
pub struct Cli {
    #[arg(short, long, default_value = "portal.toml")]
    pub config: PathBuf,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU/memory usage per report stage")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 產生 Excel / CSV 報表
    #[command(subcommand)]
    Report(ReportCommand),
    /// 寄送港口或部門主管邀請
    #[command(subcommand)]
    Invite(InviteCommand),
    /// 以邀請碼建立帳號
    AcceptInvite {
        #[arg(long)]
        token: String,
        #[arg(long)]
        password: String,
    },
    #[command(subcommand)]
    Vessel(VesselCommand),
    #[command(subcommand)]
    Weekly(WeeklyCommand),
    #[command(subcommand)]
    File(FileCommand),
    /// 登入並顯示角色
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    Vessels(ReportArgs),
    Weekly(ReportArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    /// 港口名稱、port id 或 "all"
    #[arg(long, default_value = "all")]
    pub port: String,

    /// 起始日 (YYYY-MM-DD，含)
    #[arg(long)]
    pub from: Option<String>,

    /// 結束日 (YYYY-MM-DD，含)
    #[arg(long)]
    pub to: Option<String>,

    /// 輸出格式，未指定時使用設定檔
    #[arg(long, value_delimiter = ',')]
    pub format: Vec<String>,
}

impl ReportArgs {
    pub fn filter(&self) -> Result<ReportFilter> {
        Ok(ReportFilter::new(
            PortSelection::parse(&self.port),
            DateRange::parse(self.from.as_deref(), self.to.as_deref())?,
        ))
    }

    pub fn formats(&self) -> Result<Option<Vec<ReportFormat>>> {
        if self.format.is_empty() {
            return Ok(None);
        }
        self.format
            .iter()
            .map(|f| f.parse::<ReportFormat>())
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}

#[derive(Debug, Subcommand)]
pub enum InviteCommand {
    Port {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        location: Option<String>,
    },
    Hod {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        department: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum VesselCommand {
    /// 從 JSON 檔登記船舶到港
    Register {
        #[arg(long)]
        file: PathBuf,
    },
    /// 核發離港許可
    Clear {
        #[arg(long)]
        id: String,
        #[arg(long)]
        date: NaiveDate,
    },
    List {
        #[arg(long, default_value = "all")]
        port: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum WeeklyCommand {
    /// 從 JSON 檔提交週報
    Submit {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum FileCommand {
    Upload {
        #[arg(long)]
        port: String,
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        uploaded_by: Option<String>,
    },
    Download {
        #[arg(long)]
        id: String,
        #[arg(long)]
        out: PathBuf,
    },
    Delete {
        #[arg(long)]
        id: String,
    },
    List {
        #[arg(long)]
        port: Option<String>,
    },
}
