//! Subcommand implementations.
//!
//! Each command writes to a caller-supplied writer so tests can capture the
//! output.

use std::{io::Write, sync::Arc};

use tcn_core::{
    CancellationFlag, CheckConfig, CheckError, ContactObserver, ExposureCheck, MemoryContactStore,
    MemorySecretStore, MemoryTemporaryKeyStore, MemoryTransport, ObserveError, Session,
    SessionConfig, SessionError, SystemEnv,
};
use tcn_crypto::{
    AUTHORIZATION_KEY_LEN, Memo, MemoType, ReportAuthorizationKey, SignedReport, TcnError,
};
use thiserror::Error;

/// Errors surfaced to the operator.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument could not be parsed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Hex input was malformed
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Protocol primitive failed
    #[error(transparent)]
    Crypto(#[from] TcnError),

    /// Session key operation failed
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Simulated radio delivered a bad payload
    #[error(transparent)]
    Observe(#[from] ObserveError),

    /// Exposure check failed
    #[error(transparent)]
    Check(#[from] CheckError),

    /// Writing output failed
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse a hex-encoded authorization key.
pub fn parse_secret(secret_hex: &str) -> Result<ReportAuthorizationKey, CliError> {
    let bytes = hex::decode(secret_hex.trim())?;
    let secret: [u8; AUTHORIZATION_KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
        CliError::InvalidArgument(format!(
            "secret must be {AUTHORIZATION_KEY_LEN} bytes, got {}",
            bytes.len()
        ))
    })?;
    Ok(ReportAuthorizationKey::from_bytes(&secret))
}

/// Mint a fresh authorization key from the OS RNG.
pub fn keygen(out: &mut impl Write) -> Result<(), CliError> {
    let secret = SystemEnv::new().random_secret();
    let key = ReportAuthorizationKey::from_bytes(&secret);

    writeln!(out, "secret: {}", hex::encode(&secret[..]))?;
    writeln!(out, "verification_key: {}", hex::encode(key.verification_key().as_bytes()))?;
    Ok(())
}

/// List `count` broadcast numbers starting at chain index `start`.
pub fn numbers(
    out: &mut impl Write,
    secret_hex: &str,
    start: u16,
    count: u16,
) -> Result<(), CliError> {
    let key = parse_secret(secret_hex)?;
    let mut tck = key.temporary_contact_key_at(start);

    for n in 0..count {
        writeln!(out, "{} {}", tck.index(), hex::encode(tck.temporary_contact_number().as_bytes()))?;
        if n + 1 < count {
            tck = tck.ratchet()?;
        }
    }
    Ok(())
}

/// Sign a report and print its wire encoding as hex.
pub fn report(
    out: &mut impl Write,
    secret_hex: &str,
    start: u16,
    end: u16,
    memo_type: u8,
    memo: &str,
) -> Result<(), CliError> {
    let key = parse_secret(secret_hex)?;
    let memo = Memo::new(MemoType::from(memo_type), memo.as_bytes())?;
    let report = key.create_signed_report(memo, start, end)?;

    tracing::info!(start, end, "signed report");
    writeln!(out, "{}", hex::encode(report.to_bytes()))?;
    Ok(())
}

/// Decode and verify a hex report, optionally listing its numbers.
///
/// Returns whether the signature verified.
pub fn verify(out: &mut impl Write, report_hex: &str, expand: bool) -> Result<bool, CliError> {
    let report = SignedReport::from_bytes(&hex::decode(report_hex.trim())?)?;
    let valid = report.verify()?;
    let inner = report.report();

    writeln!(out, "valid: {valid}")?;
    writeln!(out, "verification_key: {}", hex::encode(inner.verification_key().as_bytes()))?;
    writeln!(out, "range: {}..={}", inner.start_index(), inner.end_index())?;
    writeln!(out, "memo_type: {:?}", inner.memo().memo_type())?;
    writeln!(out, "memo: {}", inner.memo().data_lossy())?;

    if expand {
        for (offset, tcn) in inner.temporary_contact_numbers().enumerate() {
            let index = usize::from(inner.start_index()) + offset;
            writeln!(out, "{index} {}", hex::encode(tcn.as_bytes()))?;
        }
    }

    Ok(valid)
}

type SimSession = Session<SystemEnv, MemorySecretStore, MemoryTemporaryKeyStore>;

struct SimDevice {
    session: Arc<SimSession>,
    observer: ContactObserver<SystemEnv, MemorySecretStore, MemoryTemporaryKeyStore, MemoryContactStore>,
    check: ExposureCheck<
        SystemEnv,
        MemorySecretStore,
        MemoryTemporaryKeyStore,
        MemoryContactStore,
        MemoryTransport,
    >,
}

/// In-memory end-to-end run.
///
/// Device `i` hears device `i - 1` every period (a ring). Device 0 tests
/// positive, uploads, and every device then runs an exposure check. Only
/// device 1 heard device 0, so only it should report a contact.
pub async fn simulate(
    out: &mut impl Write,
    devices: usize,
    periods: usize,
    chunk_size: usize,
) -> Result<(), CliError> {
    if devices < 2 {
        return Err(CliError::InvalidArgument("simulation needs at least 2 devices".to_string()));
    }

    let board = Arc::new(MemoryTransport::new());
    let config = CheckConfig { chunk_size, ..CheckConfig::default() };
    let fleet: Vec<SimDevice> = (0..devices)
        .map(|i| {
            let session = Arc::new(Session::new(
                SystemEnv::new(),
                MemorySecretStore::new(),
                MemoryTemporaryKeyStore::new(),
                SessionConfig::for_user(format!("device-{i}")),
            ));
            let store = MemoryContactStore::new();
            SimDevice {
                observer: ContactObserver::new(Arc::clone(&session), store.clone()),
                check: ExposureCheck::new(
                    Arc::clone(&session),
                    store,
                    Arc::clone(&board),
                    config.clone(),
                ),
                session,
            }
        })
        .collect();

    for period in 0..periods {
        let distance = 0.5 + (period % 5) as f32;
        for (i, device) in fleet.iter().enumerate() {
            let number = device.session.next_broadcast_number().await?;
            fleet[(i + 1) % devices].observer.on_observed(number.as_bytes(), Some(distance))?;
        }
    }
    tracing::info!(devices, periods, "broadcast phase complete");

    fleet[0].session.set_tested_positive(true);

    for device in &fleet {
        let outcome = device.check.run(&CancellationFlag::new()).await?;
        writeln!(
            out,
            "{}: downloaded={} rejected={} own={} uploaded={} flagged={} contacts={}",
            device.session.user_id(),
            outcome.reports_downloaded,
            outcome.reports_rejected,
            outcome.reports_skipped_self,
            outcome.report_uploaded,
            outcome.newly_flagged.len(),
            outcome.contacts.len(),
        )?;
        for contact in &outcome.contacts {
            writeln!(
                out,
                "  exposed to {} at {:?} m, seen {}..{}",
                contact.reporter,
                contact.distance_meters,
                contact.found_secs,
                contact.last_seen_secs
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO_SECRET: &str = "0000000000000000000000000000000000000000000000000000000000000000";

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn keygen_prints_secret_and_verification_key() {
        let mut buf = Vec::new();
        keygen(&mut buf).unwrap();
        let text = output(buf);

        let secret = text.lines().next().unwrap().strip_prefix("secret: ").unwrap();
        let vk = text.lines().nth(1).unwrap().strip_prefix("verification_key: ").unwrap();
        let key = parse_secret(secret).unwrap();
        assert_eq!(hex::encode(key.verification_key().as_bytes()), vk);
    }

    #[test]
    fn numbers_match_known_answers() {
        let mut buf = Vec::new();
        numbers(&mut buf, ZERO_SECRET, 0, 11).unwrap();
        let text = output(buf);
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "0 e74345c28e1ee700e4d79ee567befaae");
        assert_eq!(lines[10], "10 2bad405dd94e44457b5d5e2ea527d867");
    }

    #[test]
    fn numbers_stop_at_chain_end() {
        let mut buf = Vec::new();
        numbers(&mut buf, ZERO_SECRET, u16::MAX, 1).unwrap();
        assert_eq!(output(buf).lines().count(), 1);

        let result = numbers(&mut Vec::new(), ZERO_SECRET, u16::MAX, 2);
        assert!(matches!(result, Err(CliError::Crypto(TcnError::ChainExhausted { .. }))));
    }

    #[test]
    fn short_secret_is_rejected() {
        assert!(matches!(parse_secret("abcd"), Err(CliError::InvalidArgument(_))));
        assert!(matches!(parse_secret("zz"), Err(CliError::Hex(_))));
    }

    #[test]
    fn report_then_verify() {
        let mut buf = Vec::new();
        report(&mut buf, ZERO_SECRET, 3, 10, 1, "user-42").unwrap();
        let encoded = output(buf);

        let mut buf = Vec::new();
        assert!(verify(&mut buf, &encoded, true).unwrap());
        let text = output(buf);

        assert!(text.contains("valid: true"));
        assert!(text.contains("range: 3..=10"));
        assert!(text.contains("memo: user-42"));
        assert!(text.contains("10 2bad405dd94e44457b5d5e2ea527d867"));
    }

    #[test]
    fn report_rejects_inverted_range() {
        let result = report(&mut Vec::new(), ZERO_SECRET, 10, 3, 1, "x");
        assert!(matches!(result, Err(CliError::Crypto(TcnError::InvalidRange { .. }))));
    }

    #[tokio::test]
    async fn simulation_exposes_only_the_neighbor() {
        let mut buf = Vec::new();
        simulate(&mut buf, 3, 4, 2).await.unwrap();
        let text = output(buf);

        assert!(text.contains("device-0: downloaded=1 rejected=0 own=1 uploaded=true flagged=0 contacts=0"));
        assert!(text.contains("device-1: downloaded=1 rejected=0 own=0 uploaded=false flagged=4 contacts=1"));
        assert!(text.contains("device-2: downloaded=1 rejected=0 own=0 uploaded=false flagged=0 contacts=0"));
        assert!(text.contains("exposed to device-0"));
    }

    #[tokio::test]
    async fn simulation_needs_two_devices() {
        let result = simulate(&mut Vec::new(), 1, 4, 2).await;
        assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    }
}
