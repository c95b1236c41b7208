/// Allow-list for the in-process multipart upload path. The presign
/// flow records the declared content-type without verifying it — this
/// list applies only here.
const ALLOWED_PREFIXES: &[&str] = &["image/", "audio/", "video/", "text/", "font/"];

const ALLOWED_EXACT: &[&str] = &[
    "application/octet-stream",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/zip",
    "application/x-7z-compressed",
    "application/x-tar",
    "application/gzip",
    "application/json",
];

pub fn is_allowed(content_type: &str) -> bool {
    let content_type = content_type.split(';').next().unwrap_or(content_type).trim();
    ALLOWED_PREFIXES.iter().any(|p| content_type.starts_with(p))
        || ALLOWED_EXACT.contains(&content_type)
}
