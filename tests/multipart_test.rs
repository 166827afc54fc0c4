use docdrop::multipart::{FieldValue, FilePart, decode, extract_boundary, split_parts};

enum Field<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

/// Encode fields the way a browser's FormData would.
fn encode(boundary: &str, fields: &[Field]) -> Vec<u8> {
    let mut body = Vec::new();
    for field in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match field {
            Field::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
            Field::File(name, filename, content) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(content);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

#[test]
fn test_browser_form_round_trip() {
    let boundary = "----WebKitFormBoundary7MA4YWxkTrZu0gW";
    let pdf: Vec<u8> = (0u8..=255).cycle().take(4096).collect();
    let body = encode(
        boundary,
        &[
            Field::Text("documentName", "Квартальный отчёт"),
            Field::Text("documentCategory", "reports"),
            Field::File("documentFile", "отчёт.pdf", &pdf),
        ],
    );

    let content_type = format!("multipart/form-data; boundary={boundary}");
    let boundary = extract_boundary(&content_type).unwrap();
    let form = decode(&body, &boundary);

    assert_eq!(form.len(), 3);
    assert_eq!(form.text("documentName"), Some("Квартальный отчёт"));
    assert_eq!(form.text("documentCategory"), Some("reports"));
    assert_eq!(
        form.file("documentFile"),
        Some(&FilePart {
            filename: "отчёт.pdf".to_string(),
            content: pdf,
        })
    );
}

#[test]
fn test_fields_are_classified() {
    let names: Vec<String> = (0..10).map(|i| format!("field{i}")).collect();
    let fields: Vec<Field> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if i % 2 == 0 {
                Field::Text(name, "value")
            } else {
                Field::File(name, "data.bin", b"\x00\x01\x02")
            }
        })
        .collect();

    let form = decode(&encode("B", &fields), "B");
    assert_eq!(form.len(), 10);
    for (i, name) in names.iter().enumerate() {
        match form.get(name) {
            Some(FieldValue::Text(value)) => {
                assert_eq!(i % 2, 0);
                assert_eq!(value, "value");
            }
            Some(FieldValue::File(file)) => {
                assert_eq!(i % 2, 1);
                assert_eq!(file.content, b"\x00\x01\x02");
            }
            None => panic!("missing {name}"),
        }
    }
}

#[test]
fn test_text_is_trimmed_files_are_not() {
    let body = encode(
        "B",
        &[
            Field::Text("documentName", "  padded name \t"),
            Field::File("file", "notes.txt", b"  keep spaces  \r\n"),
        ],
    );
    let form = decode(&body, "B");
    assert_eq!(form.text("documentName"), Some("padded name"));
    assert_eq!(form.file("file").unwrap().content, b"  keep spaces  \r\n");
}

#[test]
fn test_decode_is_idempotent() {
    let body = encode(
        "idem",
        &[
            Field::Text("documentName", "A"),
            Field::File("file", "a.txt", b"abc"),
        ],
    );
    assert_eq!(decode(&body, "idem"), decode(&body, "idem"));
}

#[test]
fn test_empty_form() {
    let body = b"--B--\r\n";
    assert!(split_parts(body, "B").is_empty());
    assert!(decode(body, "B").is_empty());
    assert!(decode(b"", "B").is_empty());
}

#[test]
fn test_duplicate_names_last_wins() {
    let body = encode(
        "B",
        &[
            Field::Text("documentName", "A"),
            Field::Text("documentName", "B"),
        ],
    );
    assert_eq!(decode(&body, "B").text("documentName"), Some("B"));
}
