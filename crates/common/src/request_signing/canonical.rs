//! Canonical message construction.
//!
//! Both peers rebuild these byte strings independently, so field order and
//! the `\n` delimiter are part of the wire contract.

const DELIMITER: u8 = b'\n';

fn join(fields: &[&[u8]]) -> Vec<u8> {
    let len = fields.iter().map(|f| f.len() + 1).sum::<usize>();
    let mut canonical = Vec::with_capacity(len);

    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            canonical.push(DELIMITER);
        }
        canonical.extend_from_slice(field);
    }

    canonical
}

/// `METHOD \n Date \n URL \n Body`
#[must_use]
pub fn canonicalize_request(method: &str, date: &str, url: &str, body: &[u8]) -> Vec<u8> {
    join(&[method.as_bytes(), date.as_bytes(), url.as_bytes(), body])
}

/// `Identity \n RequestMethod \n Date \n RequestURL \n ResponseBody`
#[must_use]
pub fn canonicalize_response(
    identity: &str,
    request_method: &str,
    date: &str,
    request_url: &str,
    response_body: &[u8],
) -> Vec<u8> {
    join(&[
        identity.as_bytes(),
        request_method.as_bytes(),
        date.as_bytes(),
        request_url.as_bytes(),
        response_body,
    ])
}
