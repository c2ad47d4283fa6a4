use super::sendmail::{MailError, Mailer, render_template};

const MODULE_UPDATE_TEMPLATE: &str = include_str!("templates/Module-update.html");

pub fn module_update_subject(module_title: &str) -> String {
    format!("Module update: '{}'", module_title)
}

pub async fn send_module_update_email<M: Mailer>(
    mailer: &M,
    to_email: &str,
    module_title: &str,
) -> Result<(), MailError> {
    let subject = module_update_subject(module_title);
    let html = render_template(
        MODULE_UPDATE_TEMPLATE,
        &serde_json::json!({ "module_title": module_title }),
    )?;

    mailer.send(to_email, &subject, &html).await
}
