use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use clap::{Args, Parser, Subcommand};
use dpop_proof::{
    DpopConfig, HtuMatching, HttpVerb, ValidationOptions, compute_ath, compute_thumbprint, parse,
};
use tracing_subscriber::EnvFilter;
use url::Url;
use uuid::Uuid;

mod key;

use key::ProofKey;

/// Generate DPoP proofs (JWS compact serialization) and check them.
#[derive(Parser, Debug)]
#[command(name = "dpop-gen", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign a proof with a client private key.
    Proof(ProofArgs),
    /// Validate a proof the way a server would.
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
struct ProofArgs {
    /// HTTP method (HTM) e.g. GET/POST/PUT
    #[arg(long, default_value = "GET")]
    method: String,

    /// Full request URL used as HTU (e.g. http://localhost:3001/api/v1/users)
    #[arg(long)]
    url: String,

    /// Path to the client's private key in PEM (PKCS#8)
    #[arg(long, value_name = "FILE")]
    private_key_pem: PathBuf,

    /// Signing algorithm: EdDSA (Ed25519) or ES256 (P-256)
    #[arg(long, default_value = "EdDSA")]
    alg: String,

    /// Access token string. If provided, ath will be included in the proof.
    #[arg(long)]
    access_token: Option<String>,

    /// Optional nonce (if your server requires it)
    #[arg(long)]
    nonce: Option<String>,

    /// Override iat (unix seconds). Default: now.
    #[arg(long)]
    iat: Option<i64>,

    /// Override jti. Default: random UUID v4.
    #[arg(long)]
    jti: Option<String>,

    /// Print only the DPoP token (no extra lines)
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// The DPoP proof (compact JWS)
    #[arg(long)]
    proof: String,

    /// HTTP method of the request
    #[arg(long, default_value = "GET")]
    method: String,

    /// Request URL
    #[arg(long)]
    url: String,

    /// Nonce the server expects
    #[arg(long)]
    nonce: Option<String>,

    /// Expected key thumbprint (dpop_jkt)
    #[arg(long)]
    jkt: Option<String>,

    /// Compare htu without stripping its query and fragment
    #[arg(long, default_value_t = false)]
    strict_htu: bool,
}

fn b64url_json(value: &serde_json::Value) -> Result<String> {
    let s = serde_json::to_string(value).context("serialize json")?;
    Ok(URL_SAFE_NO_PAD.encode(s.as_bytes()))
}

fn proof(args: ProofArgs) -> Result<()> {
    let key = ProofKey::load(&args.alg, &args.private_key_pem)?;
    let jkt = compute_thumbprint(&key.public_key()?);

    let ath = args.access_token.as_deref().map(compute_ath);
    let iat = args.iat.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let jti = args.jti.unwrap_or_else(|| Uuid::new_v4().to_string());

    let header = serde_json::json!({
        "typ": dpop_proof::dpop::DPOP_JWT_TYPE,
        "alg": key.alg(),
        "jwk": key.jwk(),
    });

    let mut claims = serde_json::Map::new();
    claims.insert("htu".to_string(), args.url.clone().into());
    claims.insert("htm".to_string(), args.method.to_uppercase().into());
    claims.insert("iat".to_string(), iat.into());
    claims.insert("jti".to_string(), jti.clone().into());
    if let Some(ath) = ath.clone() {
        claims.insert("ath".to_string(), ath.into());
    }
    if let Some(nonce) = args.nonce {
        claims.insert("nonce".to_string(), nonce.into());
    }

    let signing_input = format!(
        "{}.{}",
        b64url_json(&header)?,
        b64url_json(&serde_json::Value::Object(claims))?
    );
    let sig = key.sign(signing_input.as_bytes());
    let dpop = format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(sig));

    if args.quiet {
        println!("{}", dpop);
        return Ok(());
    }

    println!("DPoP: {}", dpop);
    println!("jkt (cnf.jkt): {}", jkt);
    println!("iat: {}", iat);
    println!("jti: {}", jti);
    match ath {
        Some(ath) => println!("ath: {}", ath),
        None => println!("ath: (none)"),
    }

    Ok(())
}

fn verify(args: VerifyArgs) -> Result<()> {
    let method: HttpVerb = args.method.parse()?;
    let url = Url::parse(&args.url).context("invalid --url")?;

    let mut options: ValidationOptions = DpopConfig::from_env()?.validation_options();
    options.nonce = args.nonce;
    options.jkt = args.jkt;
    if args.strict_htu {
        options.htu_matching = HtuMatching::Strict;
    }

    let validated = parse(&args.proof, method, &url, &options).context("proof rejected")?;

    println!("valid");
    println!("jkt: {}", validated.hashed_public_key());
    println!("jti: {}", validated.id());
    println!("iat: {}", validated.issued_at().to_rfc3339());
    if let Some(nonce) = &validated.claims().nonce {
        println!("nonce: {}", nonce);
    }

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Proof(args) => proof(args),
        Command::Verify(args) => verify(args),
    }
}
