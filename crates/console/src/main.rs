use clap::Parser;

use ums_auth::SessionConfig;
use ums_console::{app::App, command::Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ums_observability::init();

    let cli = Cli::parse();
    let config = SessionConfig::from_env()?;
    let app = App::build(config, cli.in_memory)?;

    let mut stdout = std::io::stdout();
    app.execute(cli.command, &mut stdout).await
}
