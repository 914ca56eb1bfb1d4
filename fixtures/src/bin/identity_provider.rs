use clap::Parser;
use fixtures::identity::{router, IdentityFixture, DEFAULT_AUDIENCE, DEFAULT_ISSUER};
use fixtures::{require_env_var, run_server, FixtureArgs};

/// Identity provider fixture server
#[derive(Parser, Debug)]
#[clap(name = "identity-provider-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Must match the server's ID_TOKEN_SECRET
    let secret = require_env_var("ID_TOKEN_SECRET", args.common.force, "fixture-secret")?;
    let issuer = std::env::var("ID_TOKEN_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.to_string());
    let audience =
        std::env::var("ID_TOKEN_AUDIENCE").unwrap_or_else(|_| DEFAULT_AUDIENCE.to_string());

    let app = router(IdentityFixture::new(secret, issuer, audience));

    run_server(args.common, app).await
}
