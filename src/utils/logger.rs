use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// HTTP 客戶端的連線細節只在 warn 以上輸出
const QUIET_DEPENDENCIES: &str = "hyper=warn,reqwest=warn,rustls=warn";

fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("port_portal={},{},info", level, QUIET_DEPENDENCIES)
}

/// `RUST_LOG` 優先，否則用預設指令
fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

pub fn init_cli_logger(verbose: bool) {
    // try_init: 測試或重複呼叫時不 panic
    let _ = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(verbose)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}

pub fn init_lambda_logger() {
    let _ = tracing_subscriber::registry()
        .with(env_filter(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time() // CloudWatch 自帶時間戳
                .json()
                .with_current_span(false),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(
            default_directives(false),
            "port_portal=info,hyper=warn,reqwest=warn,rustls=warn,info"
        );
        assert!(default_directives(true).starts_with("port_portal=debug,"));
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        init_cli_logger(false);
        init_cli_logger(true);
        init_lambda_logger();
    }
}
