//! What to do once an event has been handled.
//!
//! ```
//! use lintel_core::Resolution;
//!
//! let next = Resolution::redirect_to_bean("CalculatorAction")
//!     .with_event("clear")
//!     .with_parameter("keep", "memory");
//! assert!(matches!(next, Resolution::Redirect { .. }));
//! ```

use crate::http::{Parameters, Response};
use crate::url_binding::{append_query, UrlBindingFactory, EVENT_PARAMETER};
use crate::{Error, Result};
use serde::Serialize;

/// Where a forward or redirect goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Path(String),
    /// The URL bound to an action bean, optionally selecting an event.
    Bean {
        class: String,
        event: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Forward {
        target: Target,
        parameters: Parameters,
    },
    Redirect {
        target: Target,
        parameters: Parameters,
        permanent: bool,
    },
    Stream {
        content_type: String,
        body: Vec<u8>,
        filename: Option<String>,
    },
    Json(serde_json::Value),
    Error {
        status: u16,
        message: Option<String>,
    },
}

impl Resolution {
    pub fn forward(path: impl Into<String>) -> Self {
        Resolution::Forward {
            target: Target::Path(path.into()),
            parameters: Parameters::new(),
        }
    }

    pub fn forward_to_bean(class: impl Into<String>) -> Self {
        Resolution::Forward {
            target: Target::Bean {
                class: class.into(),
                event: None,
            },
            parameters: Parameters::new(),
        }
    }

    pub fn redirect(path: impl Into<String>) -> Self {
        Resolution::Redirect {
            target: Target::Path(path.into()),
            parameters: Parameters::new(),
            permanent: false,
        }
    }

    pub fn redirect_to_bean(class: impl Into<String>) -> Self {
        Resolution::Redirect {
            target: Target::Bean {
                class: class.into(),
                event: None,
            },
            parameters: Parameters::new(),
            permanent: false,
        }
    }

    /// Select the event on an action bean target. Ignored for path targets.
    pub fn with_event(mut self, name: impl Into<String>) -> Self {
        if let Resolution::Forward { target, .. } | Resolution::Redirect { target, .. } = &mut self
        {
            if let Target::Bean { event, .. } = target {
                *event = Some(name.into());
            }
        }
        self
    }

    /// Append a parameter to a forward or redirect.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        if let Resolution::Forward { parameters, .. } | Resolution::Redirect { parameters, .. } =
            &mut self
        {
            parameters
                .entry(name.into())
                .or_default()
                .push(value.to_string());
        }
        self
    }

    /// Make a redirect permanent (301).
    pub fn permanent(mut self) -> Self {
        if let Resolution::Redirect { permanent, .. } = &mut self {
            *permanent = true;
        }
        self
    }

    pub fn stream(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Resolution::Stream {
            content_type: content_type.into(),
            body: body.into(),
            filename: None,
        }
    }

    /// Offer a stream as a download.
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        if let Resolution::Stream { filename, .. } = &mut self {
            *filename = Some(name.into());
        }
        self
    }

    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Resolution::Json)
            .map_err(|e| Error::Resolution(e.to_string()))
    }

    pub fn error(status: u16) -> Self {
        Resolution::Error {
            status,
            message: None,
        }
    }

    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        if let Resolution::Error { message, .. } = &mut self {
            *message = Some(text.into());
        }
        self
    }

    /// Produce the response. Action bean targets are turned into URLs
    /// through the bindings registered in `bindings`.
    pub fn execute(&self, bindings: &UrlBindingFactory) -> Result<Response> {
        match self {
            Resolution::Forward { target, parameters } => {
                let url = target_url(target, parameters, bindings)?;
                let mut response = Response::ok();
                response.forward = Some(url);
                Ok(response)
            }
            Resolution::Redirect {
                target,
                parameters,
                permanent,
            } => {
                let url = target_url(target, parameters, bindings)?;
                let status = if *permanent { 301 } else { 302 };
                Ok(Response::new(status).with_header("Location", url))
            }
            Resolution::Stream {
                content_type,
                body,
                filename,
            } => {
                let mut response = Response::ok()
                    .with_header("Content-Type", content_type.as_str())
                    .with_body(body.clone());
                if let Some(filename) = filename {
                    response = response.with_header(
                        "Content-Disposition",
                        format!("attachment; filename=\"{}\"", filename),
                    );
                }
                Ok(response)
            }
            Resolution::Json(value) => Response::ok().with_json(value),
            Resolution::Error { status, message } => {
                let body = message.clone().unwrap_or_default().into_bytes();
                Ok(Response::new(*status).with_body(body))
            }
        }
    }
}

fn target_url(
    target: &Target,
    parameters: &Parameters,
    bindings: &UrlBindingFactory,
) -> Result<String> {
    match target {
        Target::Path(path) => Ok(append_query(path.clone(), parameters)),
        Target::Bean { class, event } => {
            let binding = bindings.binding_for_class(class).ok_or_else(|| {
                Error::Resolution(format!("action bean {} has no URL binding", class))
            })?;

            let mut parameters = parameters.clone();
            if let Some(event) = event {
                if binding.parameter(EVENT_PARAMETER).is_some() {
                    parameters.shift_insert(0, EVENT_PARAMETER.to_string(), vec![event.clone()]);
                } else {
                    parameters.shift_insert(0, event.clone(), vec![String::new()]);
                }
            }
            Ok(binding.build_url(&parameters))
        }
    }
}
