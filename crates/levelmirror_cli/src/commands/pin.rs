//! Pin command implementation.

use crate::error::CliError;
use levelmirror_fetch::{FetchConfig, LeafProbe, RustlsLeafProbe, TrustMaterial};

/// Captures the leaf certificate of the origin of `url` and prints it.
pub fn run(config: &FetchConfig, url: &str) -> Result<(), CliError> {
    let material = capture(config, &RustlsLeafProbe::new(config.timeout), url)?;
    print!("{}", render(&material));
    Ok(())
}

/// Captures and parses the leaf certificate presented by the origin of `url`.
///
/// The URL must be on the allow-list even though no request is sent.
pub fn capture(
    config: &FetchConfig,
    probe: &dyn LeafProbe,
    url: &str,
) -> Result<TrustMaterial, CliError> {
    let origin = config.origins.check(url)?;
    let der = probe.capture_leaf(&origin.host, origin.port)?;
    Ok(TrustMaterial::from_leaf_der(&origin.host, &der)?)
}

fn render(material: &TrustMaterial) -> String {
    format!(
        "host:        {}\nsubject:     {}\nissuer:      {}\nserial:      {}\nsha256:      {}\npin:         {}\n",
        material.host,
        material.subject,
        material.issuer,
        material.serial,
        material.fingerprint,
        material.pin
    )
}
