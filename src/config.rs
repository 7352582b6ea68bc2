use std::env;

#[derive(Clone, Debug)]
pub struct Collections {
    pub users: String,
    pub patients: String,
    pub appointments: String,
    pub notifications: String,
    pub bucket: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            users: "users".to_string(),
            patients: "patients".to_string(),
            appointments: "appointments".to_string(),
            notifications: "notifications".to_string(),
            bucket: "identification".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_passkey: String,
    pub store_backend: String,
    pub appwrite_endpoint: String,
    pub appwrite_project_id: String,
    pub appwrite_api_key: String,
    pub appwrite_database_id: String,
    pub collections: Collections,
    pub sms_provider: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub public_url: String,
    pub clinic_name: String,
    pub sms_max_attempts: u32,
    pub sms_queue_capacity: usize,
    pub list_page_size: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Collections::default();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "healthlink.db".to_string()),
            admin_passkey: env::var("ADMIN_PASSKEY").unwrap_or_else(|_| "111111".to_string()),
            store_backend: env::var("STORE_BACKEND").unwrap_or_else(|_| "sqlite".to_string()),
            appwrite_endpoint: env::var("APPWRITE_ENDPOINT")
                .unwrap_or_else(|_| "https://cloud.appwrite.io/v1".to_string()),
            appwrite_project_id: env::var("APPWRITE_PROJECT_ID").unwrap_or_default(),
            appwrite_api_key: env::var("APPWRITE_API_KEY").unwrap_or_default(),
            appwrite_database_id: env::var("APPWRITE_DATABASE_ID").unwrap_or_default(),
            collections: Collections {
                users: env::var("USER_COLLECTION_ID").unwrap_or(defaults.users),
                patients: env::var("PATIENT_COLLECTION_ID").unwrap_or(defaults.patients),
                appointments: env::var("APPOINTMENT_COLLECTION_ID")
                    .unwrap_or(defaults.appointments),
                notifications: env::var("NOTIFICATION_COLLECTION_ID")
                    .unwrap_or(defaults.notifications),
                bucket: env::var("BUCKET_ID").unwrap_or(defaults.bucket),
            },
            sms_provider: env::var("SMS_PROVIDER").unwrap_or_else(|_| "log".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
            public_url: env::var("PUBLIC_URL").unwrap_or_default(),
            clinic_name: env::var("CLINIC_NAME").unwrap_or_else(|_| "Health Link".to_string()),
            sms_max_attempts: env::var("SMS_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(3),
            sms_queue_capacity: env::var("SMS_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(256),
            list_page_size: env::var("LIST_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(100),
        }
    }
}
