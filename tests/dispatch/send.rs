use std::collections::HashMap;

use sendcloud_mailer::dispatch::TEMPLATE_NAME_VERIFYCODE;
use wiremock::{
    matchers::{method, path},
    Mock, ResponseTemplate,
};

use crate::helper::{email, form_fields, spawn_dispatcher};

#[tokio::test]
async fn send_issues_one_request_with_the_full_substitution_block() {
    let app = spawn_dispatcher().await;

    Mock::given(path("/webapi/mail.send_template.json"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.mail_server)
        .await;

    let variables = HashMap::from([("code".to_string(), vec!["1234".to_string()])]);
    app.dispatcher
        .send(
            "Verify",
            TEMPLATE_NAME_VERIFYCODE,
            &[email("a@x.com")],
            &variables,
        )
        .await;

    let requests = app.mail_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let fields = form_fields(&requests[0]);
    assert_eq!(fields["api_user"], "trans-user");
    assert_eq!(fields["api_key"], "trans-key");
    assert_eq!(fields["from"], "noreply@sym.example.com");
    assert_eq!(fields["fromname"], "Sym");
    assert_eq!(fields["subject"], "Verify");
    assert_eq!(fields["template_invoke_name"], "sym_verifycode");
    assert_eq!(fields["resp_email_id"], "true");

    let vars: serde_json::Value = serde_json::from_str(&fields["substitution_vars"]).unwrap();
    assert_eq!(vars["to"], serde_json::json!(["a@x.com"]));
    assert_eq!(vars["sub"], serde_json::json!({ "code": ["1234"] }));
}

#[tokio::test]
async fn send_with_no_recipients_issues_no_request() {
    let app = spawn_dispatcher().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.mail_server)
        .await;

    app.dispatcher
        .send("Verify", TEMPLATE_NAME_VERIFYCODE, &[], &HashMap::new())
        .await;
}

#[tokio::test]
async fn send_returns_normally_on_a_provider_error() {
    let app = spawn_dispatcher().await;

    Mock::given(path("/webapi/mail.send_template.json"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.mail_server)
        .await;

    let variables = HashMap::from([("code".to_string(), vec!["1234".to_string()])]);
    app.dispatcher
        .send(
            "Verify",
            TEMPLATE_NAME_VERIFYCODE,
            &[email("a@x.com")],
            &variables,
        )
        .await;
}
