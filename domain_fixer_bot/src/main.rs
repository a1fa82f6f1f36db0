use arch_bot_commons::*;
use domain_fixer_bot::{config::Config, DEFAULT_LOG_FILTER};

fn main() {
    start_everything(DEFAULT_LOG_FILTER, async {
        match Config::from_env() {
            Ok(config) => domain_fixer_bot::entry(config).await,
            Err(e) => log::error!("Bad configuration: {e}"),
        }
    });
}
