//! config/app_config.rs
//! Configuración leída de variables de entorno (cargadas con dotenv).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::queue_model::RetryPolicy;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub gateway_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BrevoConfig {
    pub api_url: String,
    pub api_key: String,
}

/// Parámetros de los procesadores de cola.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub batch_size: i64,
    pub retry: RetryPolicy,
    pub batch_delay: Duration,
    /// Corte duro por ejecución; pasado este tiempo no se procesa nada más.
    pub max_runtime: Duration,
    /// Filas en 'sending' más antiguas que esto se consideran atascadas.
    pub stuck_after: Duration,
    /// Intervalo del worker en segundo plano; cero lo desactiva.
    pub worker_interval: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            retry: RetryPolicy::default(),
            batch_delay: Duration::from_millis(1000),
            max_runtime: Duration::from_secs(50),
            stuck_after: Duration::from_secs(10 * 60),
            worker_interval: Duration::ZERO,
        }
    }
}

impl QueueSettings {
    /// Lleva a rango los valores leídos del entorno: al menos un intento y
    /// una fila por lote, esperas nunca negativas.
    pub fn sanitized(mut self) -> Self {
        self.batch_size = self.batch_size.max(1);
        self.retry.max_attempts = self.retry.max_attempts.max(1);
        self.retry.base_backoff_secs = self.retry.base_backoff_secs.max(0);
        self.retry.max_backoff_secs = self.retry.max_backoff_secs.max(0);
        self
    }
}

/// Minutos a `Duration`, saturando en valores absurdos.
pub fn minutes(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(60))
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Token bearer de los endpoints de procesos. `None` desactiva la comprobación.
    pub api_token: Option<String>,
    pub smtp: Option<SmtpConfig>,
    pub email_from: String,
    pub email_from_name: String,
    pub llm: Option<LlmConfig>,
    pub brevo: Option<BrevoConfig>,
    pub default_task_assignee: Option<String>,
    pub queue: QueueSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5022,
            database_url: "sqlite:data/crm.db".to_string(),
            api_token: None,
            smtp: None,
            email_from: "no-reply@localhost".to_string(),
            email_from_name: "CRM".to_string(),
            llm: None,
            brevo: None,
            default_task_assignee: None,
            queue: QueueSettings::default(),
        }
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(name: &str, default: T) -> T {
    match var(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("Valor inválido en {}={:?}, usando el valor por defecto", name, raw);
            default
        }),
        None => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = AppConfig::default();
        let queue_defaults = QueueSettings::default();

        let smtp = match (var("SMTP_HOST"), var("SMTP_USER"), var("SMTP_PASS")) {
            (Some(host), Some(user), Some(pass)) => Some(SmtpConfig {
                host,
                port: parsed("SMTP_PORT", 587),
                user,
                pass,
            }),
            _ => None,
        };

        let llm = var("LLM_API_KEY").map(|api_key| LlmConfig {
            gateway_url: var("LLM_GATEWAY_URL")
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            api_key,
            model: var("LLM_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            timeout: Duration::from_secs(parsed("LLM_TIMEOUT_SECS", 60)),
        });

        let brevo = var("BREVO_API_KEY").map(|api_key| BrevoConfig {
            api_url: var("BREVO_API_URL").unwrap_or_else(|| "https://api.brevo.com".to_string()),
            api_key,
        });

        let queue = QueueSettings {
            batch_size: parsed("QUEUE_BATCH_SIZE", queue_defaults.batch_size),
            retry: RetryPolicy {
                max_attempts: parsed("QUEUE_MAX_ATTEMPTS", queue_defaults.retry.max_attempts),
                base_backoff_secs: parsed(
                    "QUEUE_BACKOFF_SECS",
                    queue_defaults.retry.base_backoff_secs,
                ),
                max_backoff_secs: parsed(
                    "QUEUE_MAX_BACKOFF_SECS",
                    queue_defaults.retry.max_backoff_secs,
                ),
            },
            batch_delay: Duration::from_millis(parsed("QUEUE_BATCH_DELAY_MS", 1000)),
            max_runtime: Duration::from_secs(parsed("QUEUE_MAX_RUNTIME_SECS", 50)),
            stuck_after: minutes(parsed("QUEUE_STUCK_MINUTES", 10)),
            worker_interval: Duration::from_secs(parsed("QUEUE_WORKER_INTERVAL_SECS", 0)),
        }
        .sanitized();

        let config = Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT", defaults.port),
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            api_token: var("API_TOKEN"),
            smtp,
            email_from: var("EMAIL_FROM").unwrap_or(defaults.email_from),
            email_from_name: var("EMAIL_FROM_NAME").unwrap_or(defaults.email_from_name),
            llm,
            brevo,
            default_task_assignee: var("DEFAULT_TASK_ASSIGNEE"),
            queue,
        };

        if config.api_token.is_none() {
            log::warn!("API_TOKEN no definido: los endpoints de procesos no exigen autenticación");
        }
        if config.smtp.is_none() {
            log::warn!("SMTP no configurado: la cola de emails no se procesará");
        }
        if config.llm.is_none() {
            log::warn!("LLM_API_KEY no definido: el parseo de tareas con IA está desactivado");
        }
        if config.brevo.is_none() {
            log::warn!("BREVO_API_KEY no definido: la sincronización con el CRM está desactivada");
        }

        config
    }
}
