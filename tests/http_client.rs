use leaf_check::{
    analysis::{Severity, analyze},
    config::Config,
    detection::{Predictor, http::HttpPredictor},
    intake::SelectedImage,
};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;

/// Serves one canned reply on loopback and hands back the raw request.
fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let reply = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let request = read_request(&stream);
        let mut stream = stream;
        stream.write_all(reply.as_bytes()).unwrap();
        stream.flush().unwrap();
        request
    });
    (base, handle)
}

fn read_request(stream: &TcpStream) -> String {
    let mut reader = BufReader::new(stream);
    let mut head = String::new();
    let mut content_length = 0usize;
    let mut chunked = false;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let lower = line.to_ascii_lowercase();
        if let Some(v) = lower.strip_prefix("content-length:") {
            content_length = v.trim().parse().unwrap();
        }
        if lower.starts_with("transfer-encoding:") && lower.contains("chunked") {
            chunked = true;
        }
        head.push_str(&line);
        if line == "\r\n" || line.is_empty() {
            break;
        }
    }
    let mut body = Vec::new();
    if chunked {
        loop {
            let mut size_line = String::new();
            reader.read_line(&mut size_line).unwrap();
            let size = usize::from_str_radix(size_line.trim(), 16).unwrap();
            let mut chunk = vec![0u8; size + 2];
            reader.read_exact(&mut chunk).unwrap();
            if size == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..size]);
        }
    } else {
        body.resize(content_length, 0);
        reader.read_exact(&mut body).unwrap();
    }
    head + &String::from_utf8_lossy(&body)
}

fn config_for(base: &str) -> Config {
    let mut cfg = Config::default();
    cfg.service.base_url = base.to_string();
    cfg.service.timeout_seconds = 10;
    cfg
}

fn leaf() -> SelectedImage {
    SelectedImage::from_bytes("leaf.png", b"PNGDATA".to_vec())
}

#[test]
fn posts_multipart_and_maps_reply() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"predictions":[{"xmin":1,"ymin":2,"xmax":3,"ymax":4,"confidence":0.72,"class_id":0,"class_name":"Early_Blight"},
                           {"x1":0,"y1":0,"x2":9,"y2":9,"confidence":0.91,"class_id":1,"class_name":"Tomato_Healthy"}],
            "annotated_image":"data:image/png;base64,aGVsbG8="}"#,
    );
    let predictor = HttpPredictor::new(&config_for(&base)).unwrap();
    let result = analyze(&predictor, &leaf());
    let request = server.join().unwrap();

    assert!(request.starts_with("POST /predict HTTP/1.1"));
    assert!(request.to_ascii_lowercase().contains("content-type: multipart/form-data"));
    assert!(request.contains(r#"name="image""#));
    assert!(request.contains(r#"filename="leaf.png""#));
    assert!(request.contains("PNGDATA"));

    assert_eq!(result.is_healthy(), Some(false));
    assert_eq!(result.confidence, "91.0");
    assert_eq!(result.severity, Severity::Moderate);
    assert_eq!(result.detections.len(), 2);
    assert!(result.detections.iter().all(|d| d.bbox.is_some()));
    assert!(result.annotated_image.is_some());
}

#[test]
fn server_error_becomes_connection_error() {
    let (base, server) = serve_once("400 Bad Request", r#"{"error":"no image file in request"}"#);
    let predictor = HttpPredictor::new(&config_for(&base)).unwrap();
    let result = analyze(&predictor, &leaf());
    server.join().unwrap();

    assert_eq!(result.disease, "Connection Error");
    assert_eq!(result.severity, Severity::NotApplicable);
    assert_eq!(result.is_healthy(), None);
}

#[test]
fn refused_connection_becomes_connection_error() {
    // Bind then drop to get a port nothing listens on.
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let predictor = HttpPredictor::new(&config_for(&format!("http://127.0.0.1:{port}"))).unwrap();
    let result = analyze(&predictor, &leaf());

    assert_eq!(result.disease, "Connection Error");
    assert_eq!(result.confidence, "0.0");
    assert_eq!(result.severity, Severity::NotApplicable);
    assert!(predictor.health().is_err());
}

#[test]
fn health_endpoint_is_parsed() {
    let (base, server) = serve_once("200 OK", r#"{"status":"ok"}"#);
    let predictor = HttpPredictor::new(&config_for(&base)).unwrap();
    let health = predictor.health().unwrap();
    let request = server.join().unwrap();

    assert!(request.starts_with("GET /health HTTP/1.1"));
    assert!(health.is_ok());
}
