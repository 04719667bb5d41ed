mod disk;

use anyhow::Context;
use clap::{Parser, Subcommand};
use common::{errno, DigsigConfig, Protection, Status, PERMIT};
use disk::{DiskFile, MountTable};
use gate::Digsig;
use std::env;
use std::path::{Path, PathBuf};
use vault::{PublicKey, RevocationSet, SignatureRecord};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "digsig")]
#[command(about = "Verify signed ELF binaries the way the exec gate does", long_about = None)]
struct Cli {
    /// JSON configuration file (DIGSIG_* variables override it).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run files (or whole directories) through the verification pipeline.
    Check {
        /// Files or directories to check.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Trusted public key (PEM/DER for RSA; raw, hex or base64 for Ed25519).
        #[arg(long, env = "DIGSIG_KEY_FILE")]
        key: PathBuf,
        /// Revocation list: one hex signature id per line.
        #[arg(long, env = "DIGSIG_REVOKED_FILE")]
        revoked: Option<PathBuf>,
    },
    /// Show the ELF class, signature region and revocation id of a file.
    Inspect {
        file: PathBuf,
    },
    /// Print the digest of a file with its signature region zeroed.
    Digest {
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: .env: {}", e);
        }
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Check {
            paths,
            key,
            revoked,
        } => cmd_check(config, paths, key, revoked.as_deref()),
        Commands::Inspect { file } => cmd_inspect(file),
        Commands::Digest { file } => cmd_digest(&config, file),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<DigsigConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            DigsigConfig::from_json(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => DigsigConfig::default(),
    };
    config
        .apply_env(|k| env::var(k).ok())
        .context("DIGSIG_* environment")?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

fn cmd_check(
    config: DigsigConfig,
    paths: &[PathBuf],
    key_path: &Path,
    revoked: Option<&Path>,
) -> anyhow::Result<()> {
    let key_bytes =
        std::fs::read(key_path).with_context(|| format!("reading {}", key_path.display()))?;
    let key = PublicKey::load(config.scheme, &key_bytes)
        .with_context(|| format!("loading {}", key_path.display()))?;

    let revocations = match revoked {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            RevocationSet::parse(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => RevocationSet::new(),
    };

    let mounts = MountTable::load().unwrap_or_else(|e| {
        log::warn!("cannot read mount table ({e}), media checks see \"unknown\"");
        MountTable::default()
    });
    let digsig = Digsig::with_key(config, key)?.with_revocations(revocations);

    let mut denied = 0usize;
    let mut checked = 0usize;
    for root in paths {
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let file = match DiskFile::open(path, &mounts) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("  {}: {}", path.display(), e);
                    denied += 1;
                    continue;
                }
            };
            let status =
                digsig.on_map_for_execution(&file, Protection::READ | Protection::EXEC);
            digsig.on_descriptor_release(&file);
            checked += 1;
            if status != PERMIT {
                denied += 1;
            }
            println!("  {:<8} {}", status_name(status), path.display());
        }
    }

    let stats = digsig.stats();
    println!("+------------------------------------------+");
    println!("| DIGSIG CHECK                             |");
    println!("+------------------------------------------+");
    println!("| Files checked  : {:>22} |", checked);
    println!("| Verified       : {:>22} |", stats.verifications);
    println!("| Permitted      : {:>22} |", stats.permits);
    println!("| Denied         : {:>22} |", denied);
    println!(
        "| Verify time    : {:>19} ms |",
        stats.verify_time.as_millis()
    );
    println!("+------------------------------------------+");

    if denied > 0 {
        anyhow::bail!("{denied} file(s) denied");
    }
    Ok(())
}

fn status_name(status: Status) -> &'static str {
    match -status {
        0 => "OK",
        errno::EPERM => "EPERM",
        errno::EIO => "EIO",
        errno::ENOMEM => "ENOMEM",
        errno::EINVAL => "EINVAL",
        errno::ETXTBSY => "ETXTBSY",
        _ => "DENIED",
    }
}

// ---------------------------------------------------------------------------
// inspect
// ---------------------------------------------------------------------------

fn cmd_inspect(path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let scan = elfscan::scan(&file).with_context(|| format!("scanning {}", path.display()))?;

    println!("+------------------------------------------+");
    println!("| DIGSIG INSPECT                           |");
    println!("+------------------------------------------+");
    match scan {
        elfscan::Scan::NotElf => println!("| Format         : {:>22} |", "not ELF"),
        elfscan::Scan::Unsigned(header) => {
            print_header(&header);
            println!("| Signature      : {:>22} |", "none");
        }
        elfscan::Scan::Signed { header, signature } => {
            print_header(&header);
            let region = signature.region();
            println!(
                "| Region         : {:>22} |",
                format!("{}..{}", region.start, region.end)
            );
            match SignatureRecord::parse(&signature.record) {
                Ok(record) => {
                    println!("| Hash           : {:>22} |", format!("{:?}", record.hash()));
                    println!(
                        "| Scheme         : {:>22} |",
                        format!("{:?}", record.scheme())
                    );
                    println!("| Sig length     : {:>22} |", record.signature().len());
                    println!("+------------------------------------------+");
                    println!("revocation id: {}", record.id());
                    return Ok(());
                }
                Err(e) => println!("| Record         : {:>22} |", e.to_string()),
            }
        }
    }
    println!("+------------------------------------------+");
    Ok(())
}

fn print_header(header: &elfscan::ElfHeader) {
    println!(
        "| Class          : {:>22} |",
        format!("{:?}", header.class())
    );
    println!(
        "| Endian         : {:>22} |",
        format!("{:?}", header.endian())
    );
    println!("| Sections       : {:>22} |", header.section_count());
}

// ---------------------------------------------------------------------------
// digest
// ---------------------------------------------------------------------------

fn cmd_digest(config: &DigsigConfig, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let size = file.metadata()?.len();
    let region = match elfscan::scan(&file)? {
        elfscan::Scan::Signed { signature, .. } => signature.region(),
        elfscan::Scan::Unsigned(_) => anyhow::bail!("{} has no signature section", path.display()),
        elfscan::Scan::NotElf => anyhow::bail!("{} is not an ELF file", path.display()),
    };
    let forge = forge::Forge::new(config.hash, config.block_size)?;
    let digest = forge.digest_file(&file, size, region)?;
    println!("{}  {}", hex::encode(digest.as_bytes()), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use elfscan::fixture::ElfBuilder;
    use elfscan::Class;
    use vault::testkit::TestSigner;

    #[test]
    fn test_status_names() {
        assert_eq!(status_name(PERMIT), "OK");
        assert_eq!(status_name(-errno::ETXTBSY), "ETXTBSY");
        assert_eq!(status_name(-99), "DENIED");
    }

    #[test]
    fn test_check_signed_file_on_disk() {
        let signer = TestSigner::ed25519();
        let mut image = ElfBuilder::new(Class::Elf64).signature_at(1024).build();
        let digest = forge::Forge::new(common::HashAlgorithm::Sha1, 4096)
            .unwrap()
            .digest_file(&image, image.len() as u64, 1024..1536)
            .unwrap();
        let record = signer.sign(common::HashAlgorithm::Sha1, digest.as_bytes());
        image[1024..1536].copy_from_slice(&record.to_bytes());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app");
        std::fs::write(&path, &image).unwrap();

        let config = DigsigConfig {
            scheme: common::SignatureScheme::Ed25519,
            ..DigsigConfig::default()
        };
        let digsig = Digsig::with_key(config, signer.public_key()).unwrap();
        let file = DiskFile::open(&path, &MountTable::default()).unwrap();
        assert_eq!(
            digsig.on_map_for_execution(&file, Protection::EXEC),
            PERMIT
        );

        image[10] ^= 1;
        std::fs::write(&path, &image).unwrap();
        let digsig = Digsig::with_key(
            DigsigConfig {
                scheme: common::SignatureScheme::Ed25519,
                ..DigsigConfig::default()
            },
            signer.public_key(),
        )
        .unwrap();
        let file = DiskFile::open(&path, &MountTable::default()).unwrap();
        assert_eq!(
            digsig.on_map_for_execution(&file, Protection::EXEC),
            -errno::EPERM
        );
    }

    #[test]
    fn test_config_file_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digsig.json");
        std::fs::write(&path, r#"{"mode": "permissive", "block_size": 512}"#).unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.block_size, 512);
        assert_eq!(config.mode, common::Mode::Permissive);
    }
}
