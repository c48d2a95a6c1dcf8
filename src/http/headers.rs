use bytes::Bytes;

/// Header fields of a request, keyed case-insensitively.
///
/// Field order is the order in which each name was first seen. A repeated field keeps
/// all of its values under that first position, so re-emitting the map groups them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, Vec<Bytes>)>,
}

impl Headers {
    pub fn append(&mut self, name: &str, value: impl Into<Bytes>) {
        let value = value.into();
        match self
            .fields
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, values)) => values.push(value),
            None => self.fields.push((canonical_header_name(name), vec![value])),
        }
    }

    pub fn get_all(&self, name: impl AsRef<str>) -> &[Bytes] {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name.as_ref()))
            .map(|(_, values)| values.as_slice())
            .unwrap_or_default()
    }

    pub fn get_header(&self, name: impl AsRef<str>) -> Option<&[u8]> {
        self.get_all(name).first().map(|v| v.as_ref())
    }

    pub fn get_header_text(&self, name: impl AsRef<str>) -> Option<&str> {
        self.get_header(name)
            .and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Every (name, value) pair, one per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.fields.iter().flat_map(|(name, values)| {
            values
                .iter()
                .map(move |value| (name.as_str(), value.as_ref()))
        })
    }
}

/// `user-agent` -> `User-Agent`. Names containing non-token bytes are kept as they are.
pub fn canonical_header_name(name: &str) -> String {
    if name.is_empty() || !name.bytes().all(is_token_byte) {
        return name.to_string();
    }

    let mut upper = true;
    name.chars()
        .map(|c| {
            let c = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            c
        })
        .collect()
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_names() {
        assert_eq!(canonical_header_name("user-agent"), "User-Agent");
        assert_eq!(canonical_header_name("HOST"), "Host");
        assert_eq!(
            canonical_header_name("proxy-AUTHORIZATION"),
            "Proxy-Authorization"
        );
        assert_eq!(canonical_header_name("x y"), "x y");
    }

    #[test]
    fn repeated_fields_are_grouped_in_first_seen_order() {
        let mut headers = Headers::default();
        headers.append("accept", "a");
        headers.append("Host", "example.com");
        headers.append("ACCEPT", "b");

        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("Accept", b"a".as_slice()),
                ("Accept", b"b".as_slice()),
                ("Host", b"example.com".as_slice()),
            ]
        );
        assert_eq!(headers.get_header_text("accept"), Some("a"));
        assert_eq!(headers.get_all("Accept").len(), 2);
        assert!(headers.get_header("Cookie").is_none());
    }
}
