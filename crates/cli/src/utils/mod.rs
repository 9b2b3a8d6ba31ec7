//! Output helpers

use siths_manager::SithsCardCertificate;

/// Print a certificate summary
pub(crate) fn print_certificate(certificate: &SithsCardCertificate) {
    println!("Certificate {}", certificate.serial_string());
    println!("  Card number: {}", certificate.card_number());
    println!("  Key usage:   {}", certificate.key_usage());

    let mut subject: Vec<(String, &str)> = certificate
        .subject()
        .iter()
        .map(|(oid, value)| (oid.to_string(), value.as_str()))
        .collect();
    subject.sort();
    for (name, value) in subject {
        println!("  {name}: {value}");
    }
}
