use std::collections::HashMap;

use askama::Template;
use reqwest::Client;
use secrecy::ExposeSecret;
use tokio::task::JoinHandle;

use crate::{config::SendCloudSettings, domain::Email, lang::Labels};

/// Invoke name of the verification-code template registered on SendCloud.
pub const TEMPLATE_NAME_VERIFYCODE: &str = "sym_verifycode";

/// Invoke name of the weekly-digest template registered on SendCloud.
pub const TEMPLATE_NAME_WEEKLY: &str = "sym_weekly";

/// SendCloud template classes: triggered (transactional) vs. batch.
const TEMPLATE_TYPE_TRIGGERED: &str = "0";
const TEMPLATE_TYPE_BATCH: &str = "1";

/// Recipients per batch request; larger lists are split.
const BATCH_CHUNK_SIZE: usize = 100;

// The update call rejects an empty body; the real weekly HTML is supplied
// per send through substitution.
const WEEKLY_PLACEHOLDER_HTML: &str = "tttt";

#[derive(Template)]
#[template(path = "email/verifycode.html")]
struct VerifycodeTemplate;

#[derive(thiserror::Error, Debug)]
enum DispatchError {
    #[error("failed to encode substitution variables")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

enum CredentialSet {
    Transactional,
    Batch,
}

/// Client for the SendCloud mail API.
///
/// Holds both credential sets (triggered and batch mail use separate
/// SendCloud accounts) and the localized labels used for subjects and the
/// sender display name. Send failures are logged, never returned: a mail
/// that cannot be delivered produces no signal beyond the log line.
#[derive(Clone)]
pub struct MailDispatcher {
    http_client: Client,
    config: SendCloudSettings,
    labels: Labels,
}

impl MailDispatcher {
    pub fn new(config: SendCloudSettings, labels: Labels) -> Self {
        let http_client = Client::builder()
            .timeout(config.timeout())
            .build()
            .expect("The HTTP client should be built.");

        Self {
            http_client,
            config,
            labels,
        }
    }

    /// Creates or updates the verification-code and weekly-digest templates
    /// on SendCloud.
    ///
    /// The registration runs on a background task; the returned handle may
    /// be awaited, detached, or aborted on shutdown. Returns `None` without
    /// any provider call when the transactional credentials are blank.
    pub fn refresh_templates(&self) -> Option<JoinHandle<()>> {
        if self.config.api_user.trim().is_empty()
            || self.config.api_key.expose_secret().trim().is_empty()
        {
            tracing::warn!("sendcloud credentials are not configured, skipping template refresh");
            return None;
        }

        let dispatcher = self.clone();
        Some(tokio::spawn(async move {
            dispatcher.refresh_verifycode_template().await;
            dispatcher.refresh_weekly_template().await;
        }))
    }

    /// Sends one templated mail covering every recipient in `to_mails`.
    ///
    /// `variables` maps each substitution variable to one value per
    /// recipient, positionally aligned with `to_mails`; matching lengths are
    /// the caller's contract. Exactly one provider request is made, so lists
    /// near the provider's size limit belong in [`Self::batch_send`].
    pub async fn send(
        &self,
        subject: &str,
        template_name: &str,
        to_mails: &[Email],
        variables: &HashMap<String, Vec<String>>,
    ) {
        if to_mails.is_empty() {
            return;
        }

        if let Err(e) = self.try_send(subject, template_name, to_mails, variables).await {
            tracing::error!(error = %e, subject, template_name, "send mail error");
        }
    }

    /// Sends a templated mail to the recipients in chunks of 100.
    ///
    /// Each chunk goes out with the batch credential set and the
    /// substitution values sliced to that chunk's recipients. A failed chunk
    /// is logged and the remaining chunks are still sent.
    pub async fn batch_send(
        &self,
        subject: &str,
        template_name: &str,
        to_mails: &[Email],
        variables: &HashMap<String, Vec<String>>,
    ) {
        if to_mails.is_empty() {
            return;
        }

        for (i, chunk) in to_mails.chunks(BATCH_CHUNK_SIZE).enumerate() {
            let offset = i * BATCH_CHUNK_SIZE;
            if let Err(e) = self
                .try_send_chunk(subject, template_name, chunk, variables, offset)
                .await
            {
                tracing::error!(error = %e, subject, template_name, chunk = i, "batch send mail error");
            }
        }
    }

    async fn try_send(
        &self,
        subject: &str,
        template_name: &str,
        to_mails: &[Email],
        variables: &HashMap<String, Vec<String>>,
    ) -> Result<(), DispatchError> {
        let mut form = self.mail_form(CredentialSet::Transactional, subject, template_name);
        form.push(("substitution_vars", substitution_vars(to_mails, variables, 0)?));
        form.push(("resp_email_id", "true".to_string()));

        self.post_form(&self.mail_send_url(), &form).await?;

        Ok(())
    }

    async fn try_send_chunk(
        &self,
        subject: &str,
        template_name: &str,
        chunk: &[Email],
        variables: &HashMap<String, Vec<String>>,
        offset: usize,
    ) -> Result<(), DispatchError> {
        let mut form = self.mail_form(CredentialSet::Batch, subject, template_name);
        form.push(("substitution_vars", substitution_vars(chunk, variables, offset)?));

        self.post_form(&self.mail_send_url(), &form).await?;

        Ok(())
    }

    async fn refresh_verifycode_template(&self) {
        let html = VerifycodeTemplate.render().unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to render the verifycode template");
            String::new()
        });

        let form = vec![
            ("apiUser", self.config.api_user.clone()),
            ("apiKey", self.config.api_key.expose_secret().clone()),
            ("invokeName", TEMPLATE_NAME_VERIFYCODE.to_string()),
            ("name", "验证码".to_string()),
            (
                "subject",
                self.labels.get("verifycodeEmailSubjectLabel").to_string(),
            ),
            ("templateType", TEMPLATE_TYPE_TRIGGERED.to_string()),
            ("html", html),
        ];

        if let Err(e) = self.post_form(&self.template_url("add"), &form).await {
            tracing::error!(error = %e, template = TEMPLATE_NAME_VERIFYCODE, "template refresh failed");
        }
    }

    async fn refresh_weekly_template(&self) {
        let add_form = vec![
            ("apiUser", self.config.api_user.clone()),
            ("apiKey", self.config.api_key.expose_secret().clone()),
            ("invokeName", TEMPLATE_NAME_WEEKLY.to_string()),
            ("name", "每周推送".to_string()),
            (
                "subject",
                self.labels.get("weeklyEmailSubjectLabel").to_string(),
            ),
            ("templateType", TEMPLATE_TYPE_BATCH.to_string()),
            ("html", String::new()),
        ];

        if let Err(e) = self.post_form(&self.template_url("add"), &add_form).await {
            tracing::error!(error = %e, template = TEMPLATE_NAME_WEEKLY, "template refresh failed");
        }

        let update_form = vec![
            ("apiUser", self.config.api_user.clone()),
            ("apiKey", self.config.api_key.expose_secret().clone()),
            ("invokeName", TEMPLATE_NAME_WEEKLY.to_string()),
            ("html", WEEKLY_PLACEHOLDER_HTML.to_string()),
        ];

        if let Err(e) = self.post_form(&self.template_url("update"), &update_form).await {
            tracing::error!(error = %e, template = TEMPLATE_NAME_WEEKLY, "template refresh failed");
        }
    }

    fn mail_form(
        &self,
        credentials: CredentialSet,
        subject: &str,
        template_name: &str,
    ) -> Vec<(&'static str, String)> {
        let (api_user, api_key, from) = match credentials {
            CredentialSet::Transactional => (
                &self.config.api_user,
                &self.config.api_key,
                &self.config.from,
            ),
            CredentialSet::Batch => (
                &self.config.batch.api_user,
                &self.config.batch.api_key,
                &self.config.batch.from,
            ),
        };

        vec![
            ("api_user", api_user.clone()),
            ("api_key", api_key.expose_secret().clone()),
            ("from", from.clone()),
            ("fromname", self.labels.get("visionLabel").to_string()),
            ("subject", subject.to_string()),
            ("template_invoke_name", template_name.to_string()),
        ]
    }

    fn mail_send_url(&self) -> String {
        format!("{}/webapi/mail.send_template.json", self.config.mail_base_url)
    }

    fn template_url(&self, action: &str) -> String {
        format!("{}/apiv2/template/{}", self.config.api_base_url, action)
    }

    /// Posts a form-encoded request and consumes the response.
    ///
    /// A non-success status or an unreadable body is logged here and does
    /// not propagate; only a transport failure does.
    async fn post_form(
        &self,
        url: &str,
        form: &[(&'static str, String)],
    ) -> Result<(), reqwest::Error> {
        let response = self.http_client.post(url).form(&form).send().await?;

        let status = response.status();
        match response.text().await {
            Ok(body) if status.is_success() => {
                tracing::debug!(%status, %body, "sendcloud response");
            }
            Ok(body) => {
                tracing::error!(%status, %body, url, "sendcloud returned an error");
            }
            Err(e) => {
                tracing::error!(error = %e, url, "failed to read the sendcloud response");
            }
        }

        Ok(())
    }
}

/// Builds the `substitution_vars` block: `{"to": [...], "sub": {...}}`.
///
/// Variable values are sliced at `offset` to the recipients at hand, so a
/// batch chunk stays positionally aligned with its slice of the full value
/// lists. Lists shorter than the contract yield a short (possibly empty)
/// slice rather than an error.
fn substitution_vars(
    to_mails: &[Email],
    variables: &HashMap<String, Vec<String>>,
    offset: usize,
) -> Result<String, serde_json::Error> {
    let to: Vec<&str> = to_mails.iter().map(AsRef::as_ref).collect();

    let sub: serde_json::Map<String, serde_json::Value> = variables
        .iter()
        .map(|(name, values)| {
            let sliced: Vec<&str> = values
                .iter()
                .skip(offset)
                .take(to_mails.len())
                .map(String::as_str)
                .collect();
            (name.clone(), serde_json::json!(sliced))
        })
        .collect();

    serde_json::to_string(&serde_json::json!({ "to": to, "sub": sub }))
}
