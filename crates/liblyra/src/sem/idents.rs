//! Special identifier folding.
//!
//! Identifiers of the `__NAME__` shape fold to literals before name
//! resolution runs: the context names (`__FUNCTION__`, `__CLASS__`,
//! `__INTERFACE__`, `__PACKAGE__`, `__NAME__`) take the name of the
//! enclosing declaration, and the time family formats the compiler's
//! time snapshot. The node changes kind in place, keeping its position.

use chrono::{DateTime, Local, TimeZone, Utc};

use crate::{
    arena::NodeId,
    diagnostics::{ErrorKind, FatalError},
    node::NodeKind,
};

use super::Compiler;

impl<'a> Compiler<'a> {
    /// Folds a special identifier; returns whether the node was handled
    ///
    /// All special identifiers are written `__...__`: at least five
    /// characters, starting and ending with two underscores.
    pub(crate) fn special_identifier(&mut self, expr: NodeId) -> Result<bool, FatalError> {
        let name = self.arena.string(expr).to_string();
        if name.len() < 5 || !name.starts_with("__") || !name.ends_with("__") {
            return Ok(false);
        }

        let mut what = "?";
        let mut result = String::new();
        let mut parent_name: Option<String> = None;

        match name.as_str() {
            "__FUNCTION__" => {
                what = "a function";
                parent_name = self.enclosing_name(
                    expr,
                    &[NodeKind::Function],
                    &[
                        NodeKind::Package,
                        NodeKind::Program,
                        NodeKind::Root,
                        NodeKind::Interface,
                        NodeKind::Class,
                    ],
                );
            }
            "__CLASS__" => {
                what = "a class";
                parent_name = self.enclosing_name(
                    expr,
                    &[NodeKind::Class],
                    &[NodeKind::Package, NodeKind::Program, NodeKind::Root],
                );
            }
            "__INTERFACE__" => {
                what = "an interface";
                parent_name = self.enclosing_name(
                    expr,
                    &[NodeKind::Interface],
                    &[NodeKind::Package, NodeKind::Program, NodeKind::Root],
                );
            }
            "__PACKAGE__" => {
                what = "a package";
                parent_name = self.enclosing_name(
                    expr,
                    &[NodeKind::Package],
                    &[NodeKind::Program, NodeKind::Root],
                );
            }
            "__NAME__" => {
                what = "any function, class, interface or package";
                let mut parent = self.arena.parent(expr);
                while let Some(current) = parent {
                    match self.arena.kind(current) {
                        NodeKind::Program | NodeKind::Root => break,
                        NodeKind::Function
                        | NodeKind::Class
                        | NodeKind::Interface
                        | NodeKind::Package => {
                            let part = self.arena.string(current);
                            // anonymous frames contribute nothing to the
                            // qualified name
                            if !part.is_empty() {
                                if result.is_empty() {
                                    result = part.to_string();
                                } else {
                                    result = format!("{part}.{result}");
                                }
                            }
                            if self.arena.kind(current) == NodeKind::Package {
                                // we do not care about packages within
                                // packages here
                                break;
                            }
                        }
                        _ => {}
                    }
                    parent = self.arena.parent(current);
                }
            }
            "__TIME__" => result = self.local_time().format("%T").to_string(),
            "__DATE__" => result = self.local_time().format("%Y-%m-%d").to_string(),
            "__UTCTIME__" => result = self.utc_time().format("%T").to_string(),
            "__UTCDATE__" => result = self.utc_time().format("%Y-%m-%d").to_string(),
            "__DATE822__" => {
                // Sun, 06 Nov 2005 11:57:59 -0800
                result = self.local_time().format("%a, %d %b %Y %T %z").to_string();
            }
            "__UNIXTIME__" => {
                self.arena.set_kind(expr, NodeKind::Integer);
                self.arena.set_integer(expr, self.time);
                return Ok(true);
            }
            _ => {
                // not a special identifier
                return Ok(false);
            }
        }

        // even on failure the expression becomes a string
        self.arena.set_kind(expr, NodeKind::String);
        if !result.is_empty() {
            self.arena.set_string(expr, result);
        } else if let Some(parent_name) = parent_name {
            self.arena.set_string(expr, parent_name);
        } else {
            self.diags.error(
                ErrorKind::InvalidExpression,
                self.arena.position(expr),
                format!("'{name}' was used outside {what}."),
            );
            // the string keeps the token text
        }

        Ok(true)
    }

    /// The name of the closest enclosing node of one of `targets`,
    /// stopping at any of `stops`
    fn enclosing_name(
        &self,
        expr: NodeId,
        targets: &[NodeKind],
        stops: &[NodeKind],
    ) -> Option<String> {
        let mut parent = self.arena.parent(expr);
        while let Some(current) = parent {
            let kind = self.arena.kind(current);
            if targets.contains(&kind) {
                return Some(self.arena.string(current).to_string());
            }
            if stops.contains(&kind) {
                return None;
            }
            parent = self.arena.parent(current);
        }
        None
    }

    fn utc_time(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.time, 0)
            .single()
            .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap())
    }

    fn local_time(&self) -> DateTime<Local> {
        self.utc_time().with_timezone(&Local)
    }
}
