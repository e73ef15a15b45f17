use clap::Parser;

#[derive(Parser, Debug)]
#[clap(name = "transit-network")]
#[clap(version = "0.1.0")]
#[clap(about = "transit network service with station, route and metro network endpoints", long_about = None)]
pub struct Args {
    #[clap(short, long, default_value_t = String::from("127.0.0.1"))]
    pub host: String,

    #[clap(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Keep everything in memory instead of connecting to postgres
    #[clap(short, long, action)]
    pub offline: bool,

    #[clap(short, long, action)]
    pub verbose: bool,

    /// JSON file with the accepted admin and user tokens
    #[clap(short, long, env = "AUTH_TOKENS_FILE")]
    pub tokens: Option<String>,
}
