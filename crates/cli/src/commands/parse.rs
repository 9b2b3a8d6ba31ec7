//! Offline decoding of DER files

use std::path::Path;

use siths_asn1::Asn1Parser;
use siths_manager::SithsCardCertificate;
use tracing::warn;

use crate::utils::print_certificate;

/// Decode every element in a file
pub(crate) fn parse_command(file: &Path, tree: bool) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(file)?;
    let mut parser = Asn1Parser::new(data);
    let mut certificates = 0;

    loop {
        let parsed = match parser.parse_element() {
            Ok(Some(parsed)) => parsed,
            Ok(None) => break,
            Err(error) => {
                warn!(%error, offset = parser.position(), "Decoding stopped");
                break;
            }
        };

        println!(
            "{} at {}..{}",
            parsed.element.type_tag(),
            parsed.range.start,
            parsed.range.end
        );
        if tree {
            print!("{}", parsed.element);
        }

        if let Some(certificate) = SithsCardCertificate::from_parsed(&parsed) {
            certificates += 1;
            print_certificate(&certificate);
        }
    }

    println!("{certificates} SITHS certificate(s) found");
    Ok(())
}
