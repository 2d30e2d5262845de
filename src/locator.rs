//! Element locators
//!
//! A [`Locator`] is either lazy (resolved from its selector on every call) or
//! pinned to one element returned by [`Locator::all`].

use crate::client::WebDriverClient;
use crate::wait::ElementState;
use crate::{ElementRef, Result};
use std::sync::Arc;

/// Options for [`Locator::type_text`]
#[derive(Debug, Clone, Default)]
pub struct TypeOptions {
    /// Requested delay between keystrokes. The protocol sends the whole text
    /// in one command, so this is accepted and ignored.
    pub delay_ms: u64,
}

#[derive(Clone)]
pub struct Locator {
    client: Arc<WebDriverClient>,
    selector: String,
    element: Option<ElementRef>,
}

impl std::fmt::Debug for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locator")
            .field("selector", &self.selector)
            .field("element", &self.element)
            .finish()
    }
}

impl Locator {
    pub fn new(client: Arc<WebDriverClient>, selector: impl Into<String>) -> Self {
        Self {
            client,
            selector: selector.into(),
            element: None,
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// The pinned element, if this locator came from [`Locator::all`].
    pub fn element(&self) -> Option<&ElementRef> {
        self.element.as_ref()
    }

    fn resolve(&self) -> Result<ElementRef> {
        match &self.element {
            Some(el) => Ok(el.clone()),
            None => self.client.find_element(&self.selector),
        }
    }

    pub fn click(&self) -> Result<()> {
        let el = self.resolve()?;
        self.client.click_element(&el)
    }

    pub fn fill(&self, text: &str) -> Result<()> {
        self.type_text(text, &TypeOptions::default())
    }

    pub fn type_text(&self, text: &str, options: &TypeOptions) -> Result<()> {
        if options.delay_ms > 0 {
            log::debug!(
                "typing delay of {}ms ignored for '{}'",
                options.delay_ms,
                self.selector
            );
        }
        let el = self.resolve()?;
        self.client.send_keys(&el, text)
    }

    pub fn text_content(&self) -> Result<Option<String>> {
        let el = self.resolve()?;
        self.client.element_text(&el)
    }

    pub fn count(&self) -> Result<usize> {
        self.client.find_elements_count(&self.selector)
    }

    /// One pinned locator per current match, in document order.
    pub fn all(&self) -> Result<Vec<Locator>> {
        Ok(self
            .client
            .find_all_elements(&self.selector)?
            .into_iter()
            .map(|el| Locator {
                client: Arc::clone(&self.client),
                selector: self.selector.clone(),
                element: Some(el),
            })
            .collect())
    }

    pub fn wait_for(&self, state: ElementState) -> Result<()> {
        self.client.wait_for_selector(&self.selector, state)
    }
}
