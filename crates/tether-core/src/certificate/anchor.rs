//! Compiled-in development trust anchor
//!
//! A demonstration CA for local brokers. It is only handed out when
//! `allow_development_fallback` is set and nothing better is stored, and
//! every use is logged as a warning. Never ship it as a production anchor.

/// Development CA certificate (PEM)
pub const DEVELOPMENT_ANCHOR_PEM: &str = "\
-----BEGIN CERTIFICATE-----\n\
MIIDizCCAnOgAwIBAgIUbQWnmmWcibAjdXSGTkCNHFlSp6AwDQYJKoZIhvcNAQEL\n\
BQAwVTELMAkGA1UEBhMCVVMxDjAMBgNVBAgMBVN0YXRlMQ0wCwYDVQQHDARDaXR5\n\
MRUwEwYDVQQKDAxPcmdhbml6YXRpb24xEDAOBgNVBAMMB01RVFQtQ0EwHhcNMjUw\n\
NzE1MjE0NzUwWhcNMjYwNzE1MjE0NzUwWjBVMQswCQYDVQQGEwJVUzEOMAwGA1UE\n\
CAwFU3RhdGUxDTALBgNVBAcMBENpdHkxFTATBgNVBAoMDE9yZ2FuaXphdGlvbjEQ\n\
MA4GA1UEAwwHTVFUVC1DQTCCASIwDQYJKoZIhvcNAQEBBQADggEPADCCAQoCggEB\n\
AIzn6YZ9XmNq6ziQe9s0gEzvy/ulHgtE9dzlQTXbuloI8o5EDX4TDIuF7ijgGxIj\n\
PBugxtjBA2cmw8RwlLVWiNqBwVaoxE1a30OL6errTJLzIwGbVz4I7N7afvfSvT5O\n\
F4cx5UGOIC2pZlNxNpqpMcpZryPt6pmVBRtR2q66TrkbOPLTTij2UUcvzQJHDDNx\n\
01SbFBvaFWTM7NpI3beeXVNpQ+A7o2lhWbMYO468eJA5PuX615mrp+hbXB7wiGN/\n\
wuLl8rcBMA15JUDiUntfdCFVSszJyw2e6AQnUCFf5kaihy3Kf/Eh61ACOGEBxoPn\n\
dDyvHBRlumLJZTZWka4UOFkCAwEAAaNTMFEwHQYDVR0OBBYEFFmLyOCgVpnH6oMJ\n\
sL2ESvFpUeZCMB8GA1UdIwQYMBaAFFmLyOCgVpnH6oMJsL2ESvFpUeZCMA8GA1Ud\n\
EwEB/wQFMAMBAf8wDQYJKoZIhvcNAQELBQADggEBAC8tXrFXnptWfaavQPsakQ8w\n\
spkHvCV1t0YBT2w/fCwS/XH84pOqxj67qeDs4cj9dKnbf1bG6PUmuH/Fi/lK5HEW\n\
pU1kHbj3hV9qHERp5dtxBVNqYIMAmoSrspI72fHGNNFCYebdsuhcnXLI4UGRlmt1\n\
0SU/CFdM/S86aArlb48DCebhTY1WnNPD7oDmlURv6JBmnm2KqgN6KVEjp3cQBGMh\n\
btTQPvvU6WGTiFv74WHbvfQxz/hX2mVkJDomjU79EeejUXzkTClB2PTyRTQaIvWH\n\
EtepHpNKigkheeDUZQbe5mGyE9JSbWltJqSIJw+FFJvv20tyDnP3V1kdNjjaG7s=\n\
-----END CERTIFICATE-----\n";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::pem::is_valid_pem_format;

    #[test]
    fn test_development_anchor_is_well_formed() {
        assert!(is_valid_pem_format(DEVELOPMENT_ANCHOR_PEM));
        assert!(DEVELOPMENT_ANCHOR_PEM.ends_with("-----END CERTIFICATE-----\n"));
    }
}
