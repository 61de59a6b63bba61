use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use http::Method;
use oauth2_password::{
    AuthenticationDecorator, ClientConfig, Credentials, Endpoint, HttpTransport,
    RefreshOptions, ReqwestTransport, TokenClient,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// OAuth token URL
    #[arg(short, long)]
    token_url: String,

    /// User info URL (optional)
    #[arg(short = 'i', long)]
    user_info_url: Option<String>,

    /// Protected API URL to call with the obtained token (optional)
    #[arg(short, long)]
    api_url: Option<String>,

    /// OAuth client ID
    #[arg(short, long, default_value = "")]
    client_id: String,

    /// OAuth client secret (optional for public clients)
    #[arg(short = 's', long, default_value = "")]
    client_secret: String,

    #[arg(short, long)]
    username: String,

    #[arg(short, long)]
    password: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Force a refresh after logging in
    #[arg(long)]
    refresh: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = ClientConfig::new("demo", args.token_url.as_str())
        .with_client_credentials(args.client_id, args.client_secret);
    if let Some(url) = &args.user_info_url {
        config = config.with_user_info_endpoint(url.as_str());
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()?;
    let transport = ReqwestTransport::with_client(http);
    let client = Arc::new(TokenClient::new(config, transport.clone())?);

    let credentials = Credentials::password(args.username, args.password);
    let state = client.exchange(credentials.clone()).await?;
    info!(
        "Logged in: token type {}, refresh token {}",
        state.token_type,
        if state.refresh_token.is_some() {
            "present"
        } else {
            "absent"
        }
    );

    if args.refresh {
        client
            .current_token_with(RefreshOptions::new().force())
            .await?;
        info!("Token refreshed");
    }

    if args.user_info_url.is_some() {
        let user = client.fetch_user_info(credentials).await?;
        info!("User info: {:?}", user);
    }

    if let Some(url) = args.api_url {
        let api = AuthenticationDecorator::new(client.clone(), transport);
        let request = api.create_request(&Endpoint::from(url.as_str()), Method::GET)?;
        let response = api.execute(request).await?;
        info!("{} -> {}", url, response.status);
        println!("{}", response.body);
    }

    Ok(())
}
