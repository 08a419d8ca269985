use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub spreadsheet_id: String,
    pub google_credentials: String,
    pub google_key_path: String,
    pub google_client_email: String,
    pub google_private_key: String,
    pub slots_sheet: String,
    pub bookings_sheet: String,
    pub calendar_id: String,
    pub shop_timezone: String,
    pub open_hour: u32,
    pub close_hour: u32,
    pub closed_weekdays: String,
    pub lookahead_days: u32,
    pub lead_time_minutes: u32,
    pub upstream_timeout_secs: u64,
    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from: String,
    pub shop_email: String,
    pub shop_name: String,
    pub shop_phone: String,
    pub fallback_barber: String,
    pub allowed_origins: Vec<String>,
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: parsed_or("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "shopbook.db".to_string()),
            spreadsheet_id: env::var("SPREADSHEET_ID").unwrap_or_default(),
            google_credentials: env::var("GOOGLE_CREDENTIALS").unwrap_or_default(),
            google_key_path: env::var("GOOGLE_SERVICE_ACCOUNT_KEY").unwrap_or_default(),
            google_client_email: env::var("GOOGLE_CLIENT_EMAIL").unwrap_or_default(),
            google_private_key: env::var("GOOGLE_PRIVATE_KEY").unwrap_or_default(),
            slots_sheet: env::var("SLOTS_SHEET").unwrap_or_else(|_| "Available_Times".to_string()),
            bookings_sheet: env::var("BOOKINGS_SHEET")
                .unwrap_or_else(|_| "Form Responses".to_string()),
            calendar_id: env::var("CALENDAR_ID").unwrap_or_default(),
            shop_timezone: env::var("SHOP_TIMEZONE")
                .unwrap_or_else(|_| "America/Los_Angeles".to_string()),
            open_hour: parsed_or("OPEN_HOUR", 10),
            close_hour: parsed_or("CLOSE_HOUR", 19),
            closed_weekdays: env::var("CLOSED_WEEKDAYS").unwrap_or_else(|_| "sun,wed".to_string()),
            lookahead_days: parsed_or("LOOKAHEAD_DAYS", 90),
            lead_time_minutes: parsed_or("LEAD_TIME_MINUTES", 120),
            upstream_timeout_secs: parsed_or("UPSTREAM_TIMEOUT_SECS", 10),
            email_api_url: env::var("EMAIL_API_URL").unwrap_or_default(),
            email_api_key: env::var("EMAIL_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM").unwrap_or_default(),
            shop_email: env::var("SHOP_EMAIL").unwrap_or_default(),
            shop_name: env::var("SHOP_NAME")
                .unwrap_or_else(|_| "Distinguished Gentleman Barbers".to_string()),
            shop_phone: env::var("SHOP_PHONE").unwrap_or_default(),
            fallback_barber: env::var("FALLBACK_BARBER").unwrap_or_else(|_| "Michael".to_string()),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Slots live in Google Sheets when a spreadsheet is configured,
    /// otherwise in the local SQLite grid at `database_url`.
    pub fn uses_google_sheets(&self) -> bool {
        !self.spreadsheet_id.is_empty()
    }
}
