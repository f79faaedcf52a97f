use super::*;

#[test]
fn render_verify_injects_email_and_code() {
    let html = render_verify_email("user@example.com", "482913");
    assert!(html.contains("user@example.com"));
    assert!(html.contains("482913"));
    assert!(!html.contains("{{EMAIL}}"));
    assert!(!html.contains("{{CODE}}"));
}

#[test]
fn render_reset_injects_email_and_code() {
    let html = render_reset_email("user@example.com", "107344");
    assert!(html.contains("user@example.com"));
    assert!(html.contains("107344"));
    assert!(!html.contains("{{EMAIL}}"));
    assert!(!html.contains("{{CODE}}"));
}

#[test]
fn render_guide_application_lists_fields() {
    let destinations = vec!["Kyoto".to_owned(), "Osaka".to_owned()];
    let html = render_guide_application_email("Asha", "asha@example.com", &destinations, 250.0);
    assert!(html.contains("Asha"));
    assert!(html.contains("asha@example.com"));
    assert!(html.contains("Kyoto, Osaka"));
    assert!(html.contains("250"));
}
