//! # Letter Demo
//!
//! Seals one document to a secp256k1 recipient and a legacy RSA recipient,
//! opens it as each of them, and shows what an outsider gets.
//!
//! ## Run
//!
//! ```bash
//! RUST_LOG=debug cargo run --example letter_demo
//! ```

use vellum_core::{
    BackendRegistry, ContractSigner, CryptoConfig, Error, KeyType, Letter, PublicKey,
};

fn main() -> vellum_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vellum_core=debug".into()),
        )
        .init();

    tracing::info!("Starting letter demo v{}", vellum_core::version());
    println!("=== Vellum Core: Sealed Letter Demo ===\n");

    let config = CryptoConfig::default();
    let registry = BackendRegistry::init(&config)?;

    // Step 1: Recipients with different key types
    println!("Step 1: Creating recipients...");
    let alice = registry.generate_keypair(KeyType::Secp256k1)?;
    let bob = registry.generate_keypair(KeyType::LegacyRsa)?;
    let mallory = registry.generate_keypair(KeyType::Secp256k1)?;

    println!("  Alice (secp256k1):  {}", alice.public_key().fingerprint());
    println!("  Bob   (legacy RSA): {}", bob.public_key().fingerprint());
    println!();

    // Step 2: Seal once for both
    println!("Step 2: Sealing...");
    let document = b"Cheque #1042: pay 250.00 to the bearer";
    let recipients: Vec<PublicKey> = vec![alice.public_key().clone(), bob.public_key().clone()];
    let envelope = Letter::seal(&registry, &recipients, document)?;

    let letter = Letter::parse(&envelope)?;
    println!("  Envelope size:   {} bytes", envelope.len());
    println!("  Body mode:       {}", letter.mode_name());
    println!("  Session keys:    {}", letter.session_keys().len());
    println!("  Ephemeral key:   {}", letter.ephemeral_key().unwrap_or("(none)"));
    println!();

    // Step 3: Each recipient opens it with only their private key
    println!("Step 3: Opening...");
    for (name, keypair) in [("Alice", &alice), ("Bob", &bob)] {
        let plaintext = Letter::open(&registry, &envelope, keypair.private_key())?;
        println!("  {:<6} reads: {}", name, String::from_utf8_lossy(&plaintext));
    }

    match Letter::open(&registry, &envelope, mallory.private_key()) {
        Err(Error::SessionKeyUnwrapFailed) => {
            println!("  Mallory gets:  not a recipient (SessionKeyUnwrapFailed)")
        }
        other => println!("  Mallory gets:  unexpected {:?}", other),
    }
    println!();

    // Step 4: Sign the sealed letter as a contract
    println!("Step 4: Signing the letter...");
    let signer = ContractSigner::new(&registry);
    let signature = signer.sign_contract(&letter, alice.private_key())?;
    let valid = signer.verify_contract_signature(&letter, alice.public_key(), &signature)?;
    println!("  Signature ({}): {}", signature.hash(), if valid { "valid" } else { "INVALID" });
    println!();

    BackendRegistry::shutdown();
    println!("=== Demo complete ===");
    Ok(())
}
