use crate::config::AppConfig;
use crate::domains::booking::Booking;
use crate::domains::core::target::DeletionTarget;
use crate::domains::landlord::LandlordProfile;
use crate::domains::user::User;
use crate::errors::ServiceResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info};
use std::sync::Arc;

pub const SUBJECT_SUCCESS: &str = "Delete action succeed.";
pub const SUBJECT_FAILED: &str = "Delete action failed.";
pub const SUBJECT_ERROR: &str = "Error in delete action.";

const CONTACT_US: &str = "For questions and details, please contact us by email.";
const CHECK_LINKS: &str = "have active bookings and cannot be deleted. Please check the links below:";

/// One outbound email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub text_body: String,
    /// Alternative rendering with clickable links
    pub html_body: Option<String>,
    pub from: String,
    pub to: Vec<String>,
}

/// Outbound mail sink. A batch is delivered in one dispatch.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, messages: Vec<EmailMessage>) -> ServiceResult<()>;
}

/// Mailer that writes messages to the log instead of delivering them
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, messages: Vec<EmailMessage>) -> ServiceResult<()> {
        for message in messages {
            info!("Mail to {:?}: {} | {}", message.to, message.subject, message.text_body);
        }
        Ok(())
    }
}

/// Audience and wording of the outcome messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStrategy {
    /// An administrator or moderator removed someone else's data
    SoftAdmin,
    /// Users removing their own data
    SoftUser,
    /// An administrator depersonalized a user
    PrivacyAdmin,
}

fn occurrence_time(at: DateTime<Utc>) -> String {
    format!("\nOccurrence time: {}", at.format("%d-%m-%Y %H:%M:%S"))
}

fn stamped(message: String, at: DateTime<Utc>) -> String {
    format!("{} {}", message, occurrence_time(at))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_failed_text(message: &str, links: &[String]) -> String {
    let mut body = message.to_string();
    if !links.is_empty() {
        body.push_str("\n\n");
        body.push_str(&links.join("\n"));
    }
    body
}

fn render_failed_html(message: &str, links: &[String]) -> String {
    let items: String = links
        .iter()
        .map(|link| {
            let link = escape_html(link);
            format!("    <li><a href=\"{}\">{}</a></li>\n", link, link)
        })
        .collect();
    format!(
        "<p>{}</p>\n<ul>\n{}</ul>",
        escape_html(message).replace('\n', "<br>"),
        items
    )
}

fn owner_label(owner: &LandlordProfile) -> &'static str {
    owner.profile_type.as_str()
}

fn creator_fields(profile: &LandlordProfile, owner: &Option<User>) -> (String, String) {
    let email = owner.as_ref().map(|u| u.email.clone()).unwrap_or_default();
    let user_pk = owner
        .as_ref()
        .map(|u| u.id)
        .or(profile.created_by)
        .map(|id| id.to_string())
        .unwrap_or_default();
    (email, user_pk)
}

fn admin_error_text(target: &DeletionTarget) -> String {
    match target {
        DeletionTarget::User(user) => format!(
            "An error occurred during the soft cascade delete of account data of ({}, id: {}) user.",
            user.email, user.id
        ),
        DeletionTarget::LandlordProfile { profile, owner } => {
            let (email, user_pk) = creator_fields(profile, owner);
            format!(
                "An error occurred during the soft cascade delete of landlord profile data ({}, id: {}) \
                 of ({}, id: {}) user.",
                profile.name, profile.id, email, user_pk
            )
        }
        DeletionTarget::Property { property, owner } => format!(
            "An error occurred during the soft cascade delete of Property data ({}, id: {}) of {} ({}, id: {}).",
            property.title,
            property.id,
            owner_label(owner),
            owner.name,
            owner.id
        ),
    }
}

fn admin_success_text(target: &DeletionTarget) -> String {
    match target {
        DeletionTarget::User(user) => format!("User ({}, id: {}) was successfully deleted.", user.email, user.id),
        DeletionTarget::LandlordProfile { profile, owner } => {
            let (email, user_pk) = creator_fields(profile, owner);
            format!(
                "Landlord profile ({}, id: {}) by ({}, id: {}) user was successfully deleted.",
                profile.name, profile.id, email, user_pk
            )
        }
        DeletionTarget::Property { property, owner } => format!(
            "Property ({}, id: {}) by {} ({}, id: {}) was successfully deleted.",
            property.title,
            property.id,
            owner_label(owner),
            owner.name,
            owner.id
        ),
    }
}

fn admin_success_user_text(target: &DeletionTarget) -> String {
    match target {
        DeletionTarget::User(_) => format!("Your account data was deleted by administration. {}", CONTACT_US),
        DeletionTarget::LandlordProfile { profile, .. } => format!(
            "Your landlord profile ({}) was deleted by administration. {}",
            profile.name, CONTACT_US
        ),
        DeletionTarget::Property { property, owner } => format!(
            "Your property ({}) by {} ({}) was deleted by administration. {}",
            property.title,
            owner_label(owner),
            owner.name,
            CONTACT_US
        ),
    }
}

fn user_blocked_text(user: &User, landlord: bool) -> String {
    let subject = if landlord { "or their properties have" } else { "has" };
    format!(
        "User ({}, id: {}) {} active bookings and cannot be deleted.",
        user.email, user.id, subject
    )
}

fn admin_failed_text(target: &DeletionTarget, landlord: bool) -> String {
    match target {
        DeletionTarget::User(user) => user_blocked_text(user, landlord),
        DeletionTarget::LandlordProfile { profile, owner } => {
            let (email, user_pk) = creator_fields(profile, owner);
            format!(
                "Landlord profile ({}, id: {}) of ({}, id: {}) user has active property bookings and cannot be deleted.",
                profile.name, profile.id, email, user_pk
            )
        }
        DeletionTarget::Property { property, owner } => format!(
            "Property ({}, id: {}) by {} ({}, id: {}) has active property bookings and cannot be deleted.",
            property.title,
            property.id,
            owner_label(owner),
            owner.name,
            owner.id
        ),
    }
}

fn self_success_text(target: &DeletionTarget) -> String {
    match target {
        DeletionTarget::User(_) => "Your account data was successfully deleted.".to_string(),
        DeletionTarget::LandlordProfile { profile, .. } => {
            format!("Your landlord profile ({}) was successfully deleted.", profile.name)
        }
        DeletionTarget::Property { property, .. } => {
            format!("Your property ({}) was successfully deleted.", property.title)
        }
    }
}

fn self_failed_text(target: &DeletionTarget, landlord: bool) -> String {
    match target {
        DeletionTarget::User(_) if landlord => format!("You or your properties {}", CHECK_LINKS),
        DeletionTarget::User(_) => format!("You {}", CHECK_LINKS),
        DeletionTarget::LandlordProfile { .. } => format!("Your properties {}", CHECK_LINKS),
        DeletionTarget::Property { .. } => {
            "Your property has active bookings and cannot be deleted. Please check the links below:".to_string()
        }
    }
}

fn self_error_text(target: &DeletionTarget) -> String {
    match target {
        DeletionTarget::User(_) => {
            "An error occurred while deleting your account data, please contact us by email.".to_string()
        }
        DeletionTarget::LandlordProfile { profile, .. } => format!(
            "An error occurred while deleting your landlord ({}) data, please contact us by email.",
            profile.name
        ),
        DeletionTarget::Property { property, .. } => format!(
            "An error occurred while deleting your property ({}) data, please contact us by email.",
            property.title
        ),
    }
}

/// Formats and sends the outcome emails of one deletion request
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    strategy: NotificationStrategy,
    /// State of the target before any mutation, so addresses survive a privacy scrub
    target: DeletionTarget,
    actor_email: String,
    site_url: String,
    api_version: String,
    from: String,
    support_emails: Vec<String>,
}

impl NotificationDispatcher {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        config: &AppConfig,
        strategy: NotificationStrategy,
        target: DeletionTarget,
        actor_email: &str,
    ) -> Self {
        Self {
            mailer,
            strategy,
            target,
            actor_email: actor_email.to_string(),
            site_url: config.site_url.clone(),
            api_version: config.api_version.clone(),
            from: config.default_from_email.clone(),
            support_emails: config.support_emails.clone(),
        }
    }

    pub fn strategy(&self) -> NotificationStrategy {
        self.strategy
    }

    fn message(&self, subject: &str, text_body: String, to: Vec<String>) -> EmailMessage {
        EmailMessage {
            subject: subject.to_string(),
            text_body,
            html_body: None,
            from: self.from.clone(),
            to,
        }
    }

    fn actor_and_support(&self) -> Vec<String> {
        let mut to = vec![self.actor_email.clone()];
        to.extend(self.support_emails.iter().cloned());
        to
    }

    fn booking_links(&self, bookings: &[Booking], admin: bool) -> Vec<String> {
        bookings
            .iter()
            .map(|b| {
                if admin {
                    format!("{}/admin/properties/booking/{}/change/", self.site_url, b.id)
                } else {
                    format!("{}/api/{}/booking/owner/{}/", self.site_url, self.api_version, b.id)
                }
            })
            .collect()
    }

    fn failed_message(&self, message: &str, links: &[String], to: Vec<String>) -> EmailMessage {
        EmailMessage {
            subject: SUBJECT_FAILED.to_string(),
            text_body: render_failed_text(message, links),
            html_body: Some(render_failed_html(message, links)),
            from: self.from.clone(),
            to,
        }
    }

    pub fn success_messages(&self, at: DateTime<Utc>) -> Vec<EmailMessage> {
        match (self.strategy, &self.target) {
            (NotificationStrategy::SoftUser, target) => {
                vec![self.message(SUBJECT_SUCCESS, self_success_text(target), vec![self.actor_email.clone()])]
            }
            (NotificationStrategy::PrivacyAdmin, DeletionTarget::User(user)) => vec![
                self.message(
                    SUBJECT_SUCCESS,
                    stamped(format!("User ({}, id: {}) was successfully Depersonalised.", user.email, user.id), at),
                    self.actor_and_support(),
                ),
                self.message(
                    SUBJECT_SUCCESS,
                    format!("Your account data was depersonalised by administration. {}", CONTACT_US),
                    vec![user.email.clone()],
                ),
            ],
            (_, target) => vec![
                self.message(SUBJECT_SUCCESS, stamped(admin_success_text(target), at), self.actor_and_support()),
                self.message(
                    SUBJECT_SUCCESS,
                    admin_success_user_text(target),
                    vec![target.contact_email().to_string()],
                ),
            ],
        }
    }

    pub fn failed_messages(&self, bookings: &[Booking], is_landlord_context: bool, at: DateTime<Utc>) -> Vec<EmailMessage> {
        match self.strategy {
            NotificationStrategy::SoftUser => {
                let links = self.booking_links(bookings, false);
                let message = self_failed_text(&self.target, is_landlord_context);
                vec![self.failed_message(&message, &links, vec![self.actor_email.clone()])]
            }
            NotificationStrategy::SoftAdmin | NotificationStrategy::PrivacyAdmin => {
                let links = self.booking_links(bookings, true);
                let message = stamped(admin_failed_text(&self.target, is_landlord_context), at);
                vec![self.failed_message(&message, &links, self.actor_and_support())]
            }
        }
    }

    pub fn error_messages(&self, at: DateTime<Utc>) -> Vec<EmailMessage> {
        match (self.strategy, &self.target) {
            (NotificationStrategy::SoftUser, target) => {
                let mut messages =
                    vec![self.message(SUBJECT_ERROR, self_error_text(target), vec![self.actor_email.clone()])];
                if !self.support_emails.is_empty() {
                    messages.push(self.message(
                        SUBJECT_ERROR,
                        stamped(admin_error_text(target), at),
                        self.support_emails.clone(),
                    ));
                }
                messages
            }
            (NotificationStrategy::PrivacyAdmin, DeletionTarget::User(user)) => vec![self.message(
                SUBJECT_ERROR,
                stamped(
                    format!(
                        "An error occurred during the privacy cascade delete of account data of ({}, id: {}) user.",
                        user.email, user.id
                    ),
                    at,
                ),
                self.actor_and_support(),
            )],
            (_, target) => vec![self.message(
                SUBJECT_ERROR,
                stamped(admin_error_text(target), at),
                self.actor_and_support(),
            )],
        }
    }

    async fn dispatch(&self, messages: Vec<EmailMessage>) {
        if let Err(e) = self.mailer.send(messages).await {
            error!(
                "Failed to send deletion notification for {:?} {}: {}",
                self.target.kind(),
                self.target.id(),
                e
            );
        }
    }

    pub async fn handle_success(&self) {
        self.dispatch(self.success_messages(Utc::now())).await;
    }

    pub async fn handle_failed(&self, bookings: &[Booking], is_landlord_context: bool) {
        self.dispatch(self.failed_messages(bookings, is_landlord_context, Utc::now()))
            .await;
    }

    pub async fn handle_error(&self) {
        self.dispatch(self.error_messages(Utc::now())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::landlord::LandlordProfileType;
    use crate::test_support::{sample_booking, sample_profile, sample_property, sample_user, RecordingMailer};
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 9, 14, 5, 7).unwrap()
    }

    fn dispatcher(strategy: NotificationStrategy, target: DeletionTarget) -> (NotificationDispatcher, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher =
            NotificationDispatcher::new(mailer.clone(), &AppConfig::for_tests(), strategy, target, "admin@rentals.test");
        (dispatcher, mailer)
    }

    #[test]
    fn test_admin_success_goes_to_staff_and_owner() {
        let user = sample_user("guest@example.com");
        let (d, _) = dispatcher(NotificationStrategy::SoftAdmin, DeletionTarget::User(user.clone()));

        let messages = d.success_messages(at());
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0].text_body,
            format!(
                "User (guest@example.com, id: {}) was successfully deleted. \nOccurrence time: 09-03-2026 14:05:07",
                user.id
            )
        );
        assert_eq!(messages[0].to, vec!["admin@rentals.test", "support@rentals.test"]);
        assert_eq!(messages[1].to, vec!["guest@example.com"]);
        assert!(messages[1].text_body.starts_with("Your account data was deleted by administration."));
        assert!(messages.iter().all(|m| m.subject == SUBJECT_SUCCESS));
    }

    #[test]
    fn test_property_messages_name_the_owner_profile() {
        let profile = sample_profile("Sea Side Ltd", LandlordProfileType::Company);
        let property = sample_property(&profile, "Loft");
        let target = DeletionTarget::Property { property: property.clone(), owner: profile.clone() };
        let (d, _) = dispatcher(NotificationStrategy::SoftAdmin, target);

        let messages = d.success_messages(at());
        assert!(messages[0].text_body.starts_with(&format!(
            "Property (Loft, id: {}) by company (Sea Side Ltd, id: {}) was successfully deleted.",
            property.id, profile.id
        )));
        assert_eq!(messages[1].to, vec![profile.email.clone()]);

        let error = d.error_messages(at());
        assert!(error[0].text_body.starts_with(&format!(
            "An error occurred during the soft cascade delete of Property data (Loft, id: {}) of company (Sea Side Ltd, id: {}).",
            property.id, profile.id
        )));
    }

    #[test]
    fn test_admin_failed_lists_admin_links() {
        let user = sample_user("host@example.com");
        let booking = sample_booking();
        let (d, _) = dispatcher(NotificationStrategy::SoftAdmin, DeletionTarget::User(user.clone()));

        let messages = d.failed_messages(std::slice::from_ref(&booking), true, at());
        assert_eq!(messages.len(), 1);
        let link = format!("https://rentals.test/admin/properties/booking/{}/change/", booking.id);
        assert!(messages[0].text_body.starts_with(&format!(
            "User (host@example.com, id: {}) or their properties have active bookings and cannot be deleted.",
            user.id
        )));
        assert!(messages[0].text_body.ends_with(&link));
        assert!(messages[0].html_body.as_deref().unwrap_or_default().contains(&format!("<a href=\"{}\">", link)));
        assert_eq!(messages[0].subject, SUBJECT_FAILED);

        let guest = d.failed_messages(std::slice::from_ref(&booking), false, at());
        assert!(guest[0].text_body.starts_with(&format!(
            "User (host@example.com, id: {}) has active bookings and cannot be deleted.",
            user.id
        )));
    }

    #[test]
    fn test_self_service_wording() {
        let user = sample_user("host@example.com");
        let booking = sample_booking();
        let (d, _) = dispatcher(NotificationStrategy::SoftUser, DeletionTarget::User(user));

        let failed = d.failed_messages(std::slice::from_ref(&booking), true, at());
        assert!(failed[0].text_body.starts_with(
            "You or your properties have active bookings and cannot be deleted. Please check the links below:"
        ));
        assert!(failed[0]
            .text_body
            .contains(&format!("https://rentals.test/api/v1/booking/owner/{}/", booking.id)));
        assert_eq!(failed[0].to, vec!["admin@rentals.test"]);

        let guest_failed = d.failed_messages(std::slice::from_ref(&booking), false, at());
        assert!(guest_failed[0].text_body.starts_with("You have active bookings"));

        let errors = d.error_messages(at());
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0].text_body,
            "An error occurred while deleting your account data, please contact us by email."
        );
        assert_eq!(errors[1].to, vec!["support@rentals.test"]);
    }

    #[test]
    fn test_privacy_success_uses_original_email() {
        let user = sample_user("subject@example.com");
        let (d, _) = dispatcher(NotificationStrategy::PrivacyAdmin, DeletionTarget::User(user.clone()));

        let messages = d.success_messages(at());
        assert!(messages[0].text_body.starts_with(&format!(
            "User (subject@example.com, id: {}) was successfully Depersonalised.",
            user.id
        )));
        assert_eq!(messages[1].to, vec!["subject@example.com"]);
    }

    #[tokio::test]
    async fn test_mail_failure_is_swallowed() {
        let user = sample_user("guest@example.com");
        let (d, mailer) = dispatcher(NotificationStrategy::SoftUser, DeletionTarget::User(user));
        mailer.fail_next();

        d.handle_success().await;
        assert!(mailer.batches().is_empty());

        d.handle_success().await;
        assert_eq!(mailer.batches().len(), 1);
    }
}
