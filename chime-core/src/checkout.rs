use crate::api::AccountApi;
use crate::errors::{ChimeError, Result};
use crate::flags::{country, FlagStore, TELEGRAM_FLAG};
use crate::models::{AccountStatus, Cart, Robot, UserDetails};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Query `message` sent back by the Telegram payment flow when the payment
/// went through for an e-mail that has no account.
pub const ORPHAN_PAYMENT_MESSAGE: &str = "payment was successful but the user does not exist";
pub const BANNED_ALERT: &str = "Unauthorized user";

/// Identity of the signed-in user. The platform keys users by e-mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    Home,
    Login,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
        }
    }
}

/// What a page loader produced before the page itself runs.
#[derive(Debug, Clone)]
pub enum LoaderResult {
    Unauthenticated { redirect_to: Route },
    FetchFailed,
    Loaded(UserDetails),
}

impl LoaderResult {
    pub fn details(&self) -> Option<&UserDetails> {
        match self {
            LoaderResult::Loaded(details) => Some(details),
            _ => None,
        }
    }
}

/// Fetch the user's details, or say where to send them instead.
pub async fn load_user(api: &dyn AccountApi, session: Option<&Session>, unauthenticated: Route) -> LoaderResult {
    let Some(session) = session else {
        return LoaderResult::Unauthenticated {
            redirect_to: unauthenticated,
        };
    };

    match api.user_details(&session.email).await {
        Ok(details) => LoaderResult::Loaded(details),
        Err(e) => {
            log::error!("Error fetching user details: {}", e);
            LoaderResult::FetchFailed
        }
    }
}

/// The three query parameters the checkout page reacts to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub telegram_payment: Option<String>,
    pub status: Option<String>,
    pub message: Option<String>,
}

impl QueryParams {
    /// Parse a query string (with or without the leading `?`). The first
    /// occurrence of a repeated key wins.
    pub fn parse(query: &str) -> Self {
        let mut params = QueryParams::default();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let slot = match &*key {
                "telegram-payment" => &mut params.telegram_payment,
                "status" => &mut params.status,
                "message" => &mut params.message,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }

    pub fn is_orphan_telegram_payment(&self) -> bool {
        self.status.as_deref() == Some("failed") && self.message.as_deref() == Some(ORPHAN_PAYMENT_MESSAGE)
    }

    pub fn view(&self) -> CheckoutView {
        match self.telegram_payment.as_deref() {
            Some(value) if !value.is_empty() => CheckoutView::Telegram,
            _ => CheckoutView::Standard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutView {
    Standard,
    Telegram,
}

/// The single action a page takes after reconciling its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Render,
    ExternalRedirect { url: String },
    Navigate { route: Route, alert: Option<String> },
    ShowInactiveModal,
}

/// Decide what the page does. Rules are checked in priority order and the
/// first match wins: orphaned Telegram payment, banned, inactive, then
/// missing identity or failed loader.
pub fn reconcile(loader: &LoaderResult, query: &QueryParams, telegram_flag: Option<&str>, support_url: &str) -> Decision {
    if query.is_orphan_telegram_payment() && telegram_flag == Some("true") {
        return Decision::ExternalRedirect {
            url: support_url.to_string(),
        };
    }

    match loader {
        LoaderResult::Loaded(details) => match details.account_status() {
            AccountStatus::Banned => Decision::Navigate {
                route: Route::Home,
                alert: Some(BANNED_ALERT.to_string()),
            },
            AccountStatus::Inactive => Decision::ShowInactiveModal,
            AccountStatus::Active | AccountStatus::Absent => Decision::Render,
        },
        LoaderResult::Unauthenticated { redirect_to } => Decision::Navigate {
            route: *redirect_to,
            alert: None,
        },
        LoaderResult::FetchFailed => Decision::Navigate {
            route: Route::Home,
            alert: None,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Stripe,
    Paystack,
    Flutterwave,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaymentMethod::Stripe => "stripe",
            PaymentMethod::Paystack => "paystack",
            PaymentMethod::Flutterwave => "flutterwave",
        })
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = ChimeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stripe" => Ok(PaymentMethod::Stripe),
            "paystack" => Ok(PaymentMethod::Paystack),
            "flutterwave" => Ok(PaymentMethod::Flutterwave),
            other => Err(ChimeError::InvalidForm(format!("unknown payment method '{}'", other))),
        }
    }
}

/// Read-only view of one checkout page visit.
#[derive(Debug, Clone)]
pub struct CheckoutContext {
    pub session: Option<Session>,
    pub loader: LoaderResult,
    pub cart: Option<Cart>,
    pub query: QueryParams,
    pub country: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutPage {
    pub decision: Decision,
    pub view: CheckoutView,
    pub context: CheckoutContext,
}

/// Load and reconcile the checkout page. When the decision is the external
/// support redirect the Telegram flag is cleared first so the redirect
/// fires once.
pub async fn load_checkout(
    api: &dyn AccountApi,
    session: Option<&Session>,
    query: QueryParams,
    flags: &mut dyn FlagStore,
    support_url: &str,
) -> Result<CheckoutPage> {
    let loader = load_user(api, session, Route::Login).await;
    let telegram_flag = flags.get(TELEGRAM_FLAG);
    let decision = reconcile(&loader, &query, telegram_flag.as_deref(), support_url);

    if let Decision::ExternalRedirect { url } = &decision {
        log::info!("Orphaned Telegram payment, redirecting to {}", url);
        flags.set(TELEGRAM_FLAG, "false")?;
    }

    let cart = match (session, &decision) {
        (Some(session), Decision::Render | Decision::ShowInactiveModal) => match api.cart(&session.email).await {
            Ok(cart) => Some(cart),
            Err(e) => {
                log::warn!("Error fetching cart: {}", e);
                None
            }
        },
        _ => None,
    };

    Ok(CheckoutPage {
        view: query.view(),
        decision,
        context: CheckoutContext {
            session: session.cloned(),
            loader,
            cart,
            query,
            country: country(flags),
        },
    })
}

#[derive(Debug, Clone)]
pub struct RobotPage {
    pub decision: Decision,
    pub robot: Option<Robot>,
}

/// Purchased robot page: same account rules as checkout, but a missing
/// session goes home rather than to login.
pub async fn load_robot_page(api: &dyn AccountApi, session: Option<&Session>, slug: &str) -> RobotPage {
    let loader = load_user(api, session, Route::Home).await;
    let decision = reconcile(&loader, &QueryParams::default(), None, "");

    let robot = match decision {
        Decision::Render | Decision::ShowInactiveModal => match api.robot(slug).await {
            Ok(robot) => robot,
            Err(e) => {
                log::error!("Error fetching the robot data: {}", e);
                None
            }
        },
        _ => None,
    };

    RobotPage { decision, robot }
}
