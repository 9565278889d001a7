use serde::{Deserialize, Serialize};

/// Language of the confirmation dialog and user-visible notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Es,
}

/// Every user-visible string the reminder flows produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strings {
    pub created_title: &'static str,
    pub created_message: &'static str,
    pub view_label: &'static str,
    pub cancel_label: &'static str,
    pub error_title: &'static str,
    pub generic_error: &'static str,
    pub calendar_denied: &'static str,
    pub calendar_unsupported: &'static str,
    pub calendar_timeout: &'static str,
    pub viewer_unavailable: &'static str,
    pub notifications_denied: &'static str,
    pub notifications_unsupported: &'static str,
    pub invalid_date: &'static str,
}

const EN: Strings = Strings {
    created_title: "✅ Reminder Created",
    created_message: "Would you like to view the event?",
    view_label: "View Event",
    cancel_label: "Cancel",
    error_title: "❌ Error",
    generic_error: "Something went wrong",
    calendar_denied: "Calendar access denied",
    calendar_unsupported: "Calendar reminders are not available on this device",
    calendar_timeout: "The calendar did not respond in time",
    viewer_unavailable: "Could not open calendar",
    notifications_denied: "Notification permission not granted",
    notifications_unsupported: "Notifications are not available on this device",
    invalid_date: "The selected date is not valid",
};

const ES: Strings = Strings {
    created_title: "✅ Recordatorio creado",
    created_message: "¿Quieres ver el evento?",
    view_label: "Ver Evento",
    cancel_label: "Cancelar",
    error_title: "❌ Error",
    generic_error: "Algo salió mal",
    calendar_denied: "Acceso al calendario denegado",
    calendar_unsupported: "Los recordatorios de calendario no están disponibles en este dispositivo",
    calendar_timeout: "El calendario no respondió a tiempo",
    viewer_unavailable: "No se pudo abrir el calendario",
    notifications_denied: "Permiso de notificaciones no concedido",
    notifications_unsupported: "Las notificaciones no están disponibles en este dispositivo",
    invalid_date: "La fecha seleccionada no es válida",
};

impl Locale {
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_lowercase();
        let language = tag.split(['-', '_']).next().unwrap_or("");
        match language {
            "en" => Some(Self::En),
            "es" => Some(Self::Es),
            _ => None,
        }
    }

    pub fn strings(self) -> &'static Strings {
        match self {
            Self::En => &EN,
            Self::Es => &ES,
        }
    }
}
