use std::fmt;

use crate::error::{FolioError, Result};
use sxd_document::dom::Element;
use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Factory, Value, XPath};

/// XPath evaluator for site rules and built-in queries
pub struct XPathEvaluator {
    factory: Factory,
}

impl fmt::Debug for XPathEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XPathEvaluator").finish_non_exhaustive()
    }
}

impl XPathEvaluator {
    pub fn new() -> Self {
        Self { factory: Factory::new() }
    }

    fn compile(&self, xpath: &str) -> Result<XPath> {
        self.factory
            .build(xpath)
            .map_err(|e| FolioError::XPathError(format!("Invalid XPath '{}': {}", xpath, e)))?
            .ok_or_else(|| FolioError::XPathError(format!("Invalid XPath: {}", xpath)))
    }

    /// Evaluate an expression against `context`.
    pub fn evaluate<'d>(&self, xpath: &str, context: impl Into<Node<'d>>) -> Result<Value<'d>> {
        let compiled = self.compile(xpath)?;
        Ok(compiled.evaluate(&Context::new(), context)?)
    }

    /// Matching nodes in document order. Non-nodeset results yield nothing.
    pub fn nodes<'d>(&self, xpath: &str, context: impl Into<Node<'d>>) -> Result<Vec<Node<'d>>> {
        match self.evaluate(xpath, context)? {
            Value::Nodeset(nodeset) => Ok(nodeset.document_order()),
            _ => Ok(Vec::new()),
        }
    }

    /// Matching elements in document order.
    pub fn elements<'d>(&self, xpath: &str, context: impl Into<Node<'d>>) -> Result<Vec<Element<'d>>> {
        Ok(self.nodes(xpath, context)?.into_iter().filter_map(|n| n.element()).collect())
    }

    /// Like [`Self::nodes`], but an invalid expression is logged and treated as matching nothing.
    pub fn nodes_lenient<'d>(&self, xpath: &str, context: impl Into<Node<'d>>) -> Vec<Node<'d>> {
        self.nodes(xpath, context).unwrap_or_else(|e| {
            tracing::warn!(%xpath, error = %e, "skipping XPath");
            Vec::new()
        })
    }

    /// Evaluate each expression in order and return the first non-empty string.
    ///
    /// String results are used as-is; a node result yields its string value.
    pub fn first_string<'d>(&self, xpaths: &[String], context: impl Into<Node<'d>> + Copy) -> Option<String> {
        for xpath in xpaths {
            let value = match self.evaluate(xpath, context) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(%xpath, error = %e, "skipping XPath");
                    continue;
                }
            };
            let result = match value {
                Value::String(s) => s,
                Value::Nodeset(nodeset) => nodeset.document_order_first().map(|n| n.string_value()).unwrap_or_default(),
                Value::Boolean(_) | Value::Number(_) => continue,
            };
            let result = normalize_space(&result);
            if !result.is_empty() {
                return Some(result);
            }
        }
        None
    }

    /// Every non-empty, whitespace-normalized string an expression yields, in document order.
    pub fn strings<'d>(&self, xpath: &str, context: impl Into<Node<'d>>) -> Vec<String> {
        let values = match self.evaluate(xpath, context) {
            Ok(Value::Nodeset(nodeset)) => nodeset.document_order().into_iter().map(|n| n.string_value()).collect(),
            Ok(Value::String(s)) => vec![s],
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!(%xpath, error = %e, "skipping XPath");
                Vec::new()
            }
        };
        values.iter().map(|v| normalize_space(v)).filter(|v| !v.is_empty()).collect()
    }
}

impl Default for XPathEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse runs of whitespace and trim.
pub(crate) fn normalize_space(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
