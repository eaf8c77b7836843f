use crate::api::validation::HelloInput;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

pub const PRODUCT_NAME: &str = "Next-Gen Web Scaffold";
pub const VERSION: &str = "2.0.0";

pub const FEATURES: [&str; 6] = [
    "Security-first approach",
    "TypeScript strict mode",
    "Rate limiting",
    "Input validation",
    "Security headers",
    "Error handling",
];

/// Current time as an ISO-8601 UTC string with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Developer {
    pub name: &'static str,
    pub expertise: [&'static str; 3],
    pub ai_powered: bool,
}

/// Body of a successful `GET /api/route`.
#[derive(Debug, Serialize)]
pub struct Greeting {
    pub message: String,
    pub timestamp: String,
    pub version: &'static str,
    pub features: [&'static str; 6],
    pub developer: Developer,
}

impl Greeting {
    pub fn new(input: &HelloInput) -> Self {
        let message = match &input.name {
            Some(name) => format!("Hello, {name}! Welcome to the {PRODUCT_NAME}!"),
            None => format!("Hello, world! Welcome to the {PRODUCT_NAME}!"),
        };
        Self {
            message,
            timestamp: timestamp(),
            version: VERSION,
            features: FEATURES,
            developer: Developer {
                name: "Professional Developer",
                expertise: [
                    "Full-stack Development",
                    "Security",
                    "Performance Optimization",
                ],
                ai_powered: true,
            },
        }
    }
}

/// Body of a successful `POST /api/route`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub message: String,
    pub timestamp: String,
    pub method: &'static str,
    pub received_data: HelloInput,
    pub processed: bool,
}

impl Submission {
    pub fn new(input: HelloInput) -> Self {
        let message = match &input.name {
            Some(name) => format!("Hello, {name}! Your POST request was successful."),
            None => "Hello! Your POST request was successful.".to_owned(),
        };
        Self {
            message,
            timestamp: timestamp(),
            method: "POST",
            received_data: input,
            processed: true,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: String,
}
