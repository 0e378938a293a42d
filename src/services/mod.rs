pub mod analytics_service;
pub mod auth_service;
pub mod invoice_service;
pub mod message_service;
pub mod order_service;
pub mod product_service;
pub mod upload_service;
pub mod user_service;

/// `%search%` for ILIKE with the wildcards `%` and `_` (and the escape
/// character itself) matched literally.
pub fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for ch in search.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
