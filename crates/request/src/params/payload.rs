use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{BufMut, Bytes, BytesMut};

use super::{Blob, ParamValue, Params};

static BOUNDARY_SEQ: AtomicU64 = AtomicU64::new(0x5eed);

/// An encoded request body together with its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub content_type: String,
    pub body: Bytes,
}

impl Params {
    /// Encodes the params as a request body.
    ///
    /// Text-only params become `application/x-www-form-urlencoded`. As soon as one param
    /// is binary the whole set is encoded as `multipart/form-data`.
    pub fn to_payload(&self) -> Payload {
        if self.has_binary() { self.to_multipart() } else { self.to_urlencoded() }
    }

    pub fn to_urlencoded(&self) -> Payload {
        Payload { content_type: mime::APPLICATION_WWW_FORM_URLENCODED.to_string(), body: Bytes::from(self.to_query()) }
    }

    /// Encodes the params as `multipart/form-data`, even when all of them are text.
    pub fn to_multipart(&self) -> Payload {
        let boundary = self.boundary();
        Payload {
            content_type: format!("{}; boundary={boundary}", mime::MULTIPART_FORM_DATA),
            body: self.encode_multipart(&boundary),
        }
    }

    fn boundary(&self) -> String {
        loop {
            let seq = BOUNDARY_SEQ.fetch_add(1, Ordering::Relaxed);
            let boundary = format!("----MicroRequestBoundary{seq:016x}");
            let collides = self
                .entries
                .iter()
                .any(|(name, value)| contains(name.as_bytes(), &boundary) || value_contains(value, &boundary));
            if !collides {
                return boundary;
            }
        }
    }

    fn encode_multipart(&self, boundary: &str) -> Bytes {
        let mut buf = BytesMut::new();
        for (name, value) in &self.entries {
            buf.put_slice(b"--");
            buf.put_slice(boundary.as_bytes());
            buf.put_slice(b"\r\nContent-Disposition: form-data; name=\"");
            buf.put_slice(escape_field(name).as_bytes());
            buf.put_slice(b"\"");

            match value {
                ParamValue::Text(text) => {
                    buf.put_slice(b"\r\n\r\n");
                    buf.put_slice(text.as_bytes());
                }
                ParamValue::Binary(Blob { data, filename, content_type }) => {
                    buf.put_slice(b"; filename=\"");
                    buf.put_slice(escape_field(filename.as_deref().unwrap_or("blob")).as_bytes());
                    buf.put_slice(b"\"\r\nContent-Type: ");
                    let content_type = content_type
                        .as_ref()
                        .map_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string(), ToString::to_string);
                    buf.put_slice(content_type.as_bytes());
                    buf.put_slice(b"\r\n\r\n");
                    buf.put_slice(data);
                }
            }
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"--");
        buf.put_slice(boundary.as_bytes());
        buf.put_slice(b"--\r\n");
        buf.freeze()
    }
}

fn value_contains(value: &ParamValue, boundary: &str) -> bool {
    match value {
        ParamValue::Text(text) => contains(text.as_bytes(), boundary),
        ParamValue::Binary(blob) => contains(&blob.data, boundary),
    }
}

fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle.as_bytes())
}

// quotes and line breaks would end the header, they are percent-encoded like browsers do
fn escape_field(field: &str) -> String {
    field.replace('"', "%22").replace('\r', "%0D").replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_params_are_urlencoded() {
        let payload = Params::from([("name", "Ada Lovelace"), ("lang", "en")]).to_payload();

        assert_eq!(payload.content_type, "application/x-www-form-urlencoded");
        assert_eq!(payload.body, Bytes::from_static(b"name=Ada+Lovelace&lang=en"));
    }

    #[test]
    fn binary_params_switch_to_multipart() {
        let mut params = Params::from([("title", "Me")]);
        params.add("file", Blob::new(&b"PNGDATA"[..]).filename("me \"1\".png").content_type(mime::IMAGE_PNG));

        let payload = params.to_payload();
        let boundary = payload.content_type.strip_prefix("multipart/form-data; boundary=").unwrap();

        let expected = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"title\"\r\n\r\n\
             Me\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"me %221%22.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             PNGDATA\r\n\
             --{boundary}--\r\n"
        );
        assert_eq!(payload.body, Bytes::from(expected));
    }

    #[test]
    fn unnamed_blob_defaults() {
        let mut params = Params::new();
        params.add("file", Blob::new(Bytes::from_static(b"raw")));

        let payload = params.to_payload();
        let boundary = payload.content_type.split("boundary=").nth(1).unwrap().to_owned();
        let body = String::from_utf8(payload.body.to_vec()).unwrap();

        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.contains("filename=\"blob\"\r\nContent-Type: application/octet-stream\r\n\r\nraw\r\n"));
        assert!(body.ends_with(&format!("--{boundary}--\r\n")));
    }
}
