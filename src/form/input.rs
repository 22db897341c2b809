// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Form inputs

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File chosen for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInput {
    pub name: String,
    /// No file chosen when `None`
    pub path: Option<PathBuf>,
    /// Overrides the type guessed from the file extension
    pub content_type: Option<String>,
}

/// One input of a form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Any free-form input (text, hidden, password, textarea, ...)
    Text { name: String, value: Option<String> },
    /// Radio group; at most one of `values` is selected
    Radio {
        name: String,
        values: Vec<String>,
        selected: Option<String>,
    },
    /// Select box; at most one of `options` is selected
    Select {
        name: String,
        options: Vec<String>,
        selected: Option<String>,
    },
    File(FileInput),
}

impl Input {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Input::Text {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Radio group with nothing selected
    pub fn radio<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Input::Radio {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            selected: None,
        }
    }

    /// Select box with nothing selected
    pub fn select<I, S>(name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Input::Select {
            name: name.into(),
            options: options.into_iter().map(Into::into).collect(),
            selected: None,
        }
    }

    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Input::File(FileInput {
            name: name.into(),
            path: Some(path.into()),
            content_type: None,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Input::Text { name, .. }
            | Input::Radio { name, .. }
            | Input::Select { name, .. } => name,
            Input::File(file) => &file.name,
        }
    }

    /// Current value; the path of a file input
    pub fn value(&self) -> Option<&str> {
        match self {
            Input::Text { value, .. } => value.as_deref(),
            Input::Radio { selected, .. } | Input::Select { selected, .. } => selected.as_deref(),
            Input::File(file) => file.path.as_deref().and_then(Path::to_str),
        }
    }

    /// Set the value
    ///
    /// Radio groups and select boxes only accept one of their own values.
    pub fn set_value(&mut self, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        match self {
            Input::Text { value: current, .. } => *current = Some(value),
            Input::Radio {
                name,
                values: allowed,
                selected,
            }
            | Input::Select {
                name,
                options: allowed,
                selected,
            } => {
                if !allowed.contains(&value) {
                    return Err(Error::form(format!(
                        "Value '{}' of '{}' is not in the set of acceptable values {:?}",
                        value, name, allowed
                    )));
                }
                *selected = Some(value);
            }
            Input::File(file) => file.path = Some(PathBuf::from(value)),
        }
        Ok(())
    }

    /// Clear the value, or the selection
    pub fn clear(&mut self) {
        match self {
            Input::Text { value, .. } => *value = None,
            Input::Radio { selected, .. } | Input::Select { selected, .. } => *selected = None,
            Input::File(file) => file.path = None,
        }
    }
}
