//! Context scope: one application mounted under a path.
//!
//! # Responsibilities
//! - Hold the handler mappings the context mapper resolves against
//! - Hold filter definitions, filter mappings and started filter instances
//! - Refuse forbidden paths and report availability to the wrapper valve
//!
//! # Design Decisions
//! - Mapping tables are published as whole snapshots (`ArcSwap`), so a
//!   request always sees one consistent table
//! - Filters are instantiated when the context starts and destroyed when it
//!   stops; a definition added while running starts immediately
//! - `load_on_startup` handlers are loaded after filters, lowest value first

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::config::ContextConfig;
use crate::container::Container;
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterConfig, FilterDef, FilterMapping};
use crate::handler::HandlerError;
use crate::routing::mapper::HandlerMappings;
use crate::routing::matcher::PathPrefixMatcher;
use crate::routing::pattern::validate_url_pattern;

pub(crate) struct ContextScope {
    matcher: PathPrefixMatcher,
    available: AtomicBool,
    mappings: ArcSwap<HandlerMappings>,
    filter_defs: DashMap<String, FilterDef>,
    filter_mappings: ArcSwap<Vec<FilterMapping>>,
    filters: DashMap<String, Arc<dyn Filter>>,
    forbidden_prefixes: Vec<String>,
}

impl ContextScope {
    pub(crate) fn new(path: String, config: &ContextConfig) -> Self {
        Self {
            matcher: PathPrefixMatcher::new(path),
            available: AtomicBool::new(true),
            mappings: ArcSwap::from_pointee(HandlerMappings::default()),
            filter_defs: DashMap::new(),
            filter_mappings: ArcSwap::from_pointee(Vec::new()),
            filters: DashMap::new(),
            forbidden_prefixes: config.forbidden_prefixes.clone(),
        }
    }

    pub(crate) fn path(&self) -> &str {
        self.matcher.prefix()
    }
}

/// Context view of a [`Container`].
#[derive(Clone, Copy)]
pub struct Context<'a> {
    container: &'a Container,
    scope: &'a ContextScope,
}

impl<'a> Context<'a> {
    pub(crate) fn new(container: &'a Container, scope: &'a ContextScope) -> Self {
        Self { container, scope }
    }

    pub fn container(&self) -> &'a Container {
        self.container
    }

    /// Mount path; "" for the root context.
    pub fn path(&self) -> &'a str {
        self.scope.path()
    }

    /// True if `path` lies inside this context (segment boundary).
    pub fn matches(&self, path: &str) -> bool {
        self.scope.matcher.matches(path)
    }

    /// `path` with the context path removed, `/` when nothing remains.
    pub fn relative_path<'p>(&self, path: &'p str) -> Option<&'p str> {
        self.scope.matcher.strip(path)
    }

    // --- Availability ---

    pub fn is_available(&self) -> bool {
        self.scope.available.load(Ordering::Acquire)
    }

    /// Pause (false) or resume (true) request processing.
    pub fn set_available(&self, available: bool) {
        self.scope.available.store(available, Ordering::Release);
        tracing::info!(context = %self.container.label(), available, "Context availability changed");
    }

    /// True for relative paths under a forbidden prefix such as `/WEB-INF`.
    pub fn is_forbidden(&self, relative_path: &str) -> bool {
        self.scope.forbidden_prefixes.iter().any(|prefix| {
            relative_path.len() >= prefix.len()
                && relative_path.is_char_boundary(prefix.len())
                && relative_path[..prefix.len()].eq_ignore_ascii_case(prefix)
                && (relative_path.len() == prefix.len() || relative_path[prefix.len()..].starts_with('/'))
        })
    }

    // --- Handler mappings ---

    /// Map `pattern` to the wrapper child named `wrapper`, replacing any
    /// previous mapping of the same pattern.
    pub fn add_handler_mapping(&self, pattern: &str, wrapper: &str) -> Result<()> {
        validate_url_pattern(pattern)?;
        self.scope.mappings.rcu(|current| current.with(pattern, wrapper));
        tracing::debug!(context = %self.container.label(), pattern, wrapper, "Handler mapping added");
        Ok(())
    }

    pub fn remove_handler_mapping(&self, pattern: &str) -> bool {
        let mut removed = false;
        self.scope.mappings.rcu(|current| {
            removed = current.get(pattern).is_some();
            current.without(pattern)
        });
        removed
    }

    pub fn find_handler_mapping(&self, pattern: &str) -> Option<String> {
        self.scope.mappings.load().get(pattern).map(str::to_string)
    }

    /// Snapshot of the current mapping table.
    pub fn handler_mappings(&self) -> Arc<HandlerMappings> {
        self.scope.mappings.load_full()
    }

    // --- Filters ---

    /// Register a filter definition. When the context is running the filter
    /// is instantiated and initialized right away.
    pub fn add_filter_def(&self, def: FilterDef) -> Result<()> {
        if self.container.is_running() {
            self.start_filter(&def)?;
        }
        self.scope.filter_defs.insert(def.name().to_string(), def);
        Ok(())
    }

    /// Drop a definition and destroy its started instance.
    pub fn remove_filter_def(&self, name: &str) -> bool {
        if let Some((_, filter)) = self.scope.filters.remove(name) {
            filter.destroy();
        }
        self.scope.filter_defs.remove(name).is_some()
    }

    pub fn find_filter_def(&self, name: &str) -> Option<FilterDef> {
        self.scope.filter_defs.get(name).map(|def| def.value().clone())
    }

    /// Append a mapping. Its filter must already be defined.
    pub fn add_filter_mapping(&self, mapping: FilterMapping) -> Result<()> {
        if !self.scope.filter_defs.contains_key(mapping.filter_name()) {
            return Err(Error::UnknownFilter {
                context: self.container.label().to_string(),
                filter: mapping.filter_name().to_string(),
            });
        }
        mapping.validate()?;
        self.scope.filter_mappings.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(mapping.clone());
            next
        });
        Ok(())
    }

    /// Remove every mapping of the named filter.
    pub fn remove_filter_mappings(&self, filter_name: &str) -> bool {
        let mut removed = false;
        self.scope.filter_mappings.rcu(|current| {
            let next: Vec<FilterMapping> = current
                .iter()
                .filter(|m| m.filter_name() != filter_name)
                .cloned()
                .collect();
            removed = next.len() != current.len();
            next
        });
        removed
    }

    /// Mappings in configuration order.
    pub fn filter_mappings(&self) -> Arc<Vec<FilterMapping>> {
        self.scope.filter_mappings.load_full()
    }

    /// The started instance of a filter.
    pub fn filter(&self, name: &str) -> Option<Arc<dyn Filter>> {
        self.scope.filters.get(name).map(|f| f.value().clone())
    }

    fn start_filter(&self, def: &FilterDef) -> Result<()> {
        let config = FilterConfig {
            filter_name: def.name().to_string(),
            context_path: self.path().to_string(),
            params: def.params().clone(),
        };
        let filter = def
            .instantiate()
            .and_then(|filter| filter.init(&config).map(|()| filter))
            .map_err(|source| Error::FilterInit {
                filter: def.name().to_string(),
                source,
            })?;

        if let Some(previous) = self.scope.filters.insert(def.name().to_string(), filter) {
            previous.destroy();
        }
        tracing::debug!(context = %self.container.label(), filter = %def.name(), "Filter started");
        Ok(())
    }

    fn filter_start(&self) -> Result<()> {
        let mut defs: Vec<FilterDef> = self
            .scope
            .filter_defs
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        defs.sort_by(|a, b| a.name().cmp(b.name()));

        for def in &defs {
            if let Err(e) = self.start_filter(def) {
                tracing::error!(context = %self.container.label(), error = %e, "Filter failed to start");
                self.filter_stop();
                return Err(e);
            }
        }
        Ok(())
    }

    fn filter_stop(&self) {
        let names: Vec<String> = self.scope.filters.iter().map(|e| e.key().clone()).collect();
        for name in names {
            if let Some((_, filter)) = self.scope.filters.remove(&name) {
                filter.destroy();
            }
        }
    }

    fn load_on_startup(&self) {
        let mut wrappers: Vec<(u32, Arc<Container>)> = self
            .container
            .find_children()
            .into_iter()
            .filter_map(|child| {
                let order = child.as_wrapper()?.load_on_startup()?;
                Some((order, child))
            })
            .collect();
        wrappers.sort_by(|(a, wa), (b, wb)| a.cmp(b).then_with(|| wa.name().cmp(wb.name())));

        for (_, child) in wrappers {
            let Some(wrapper) = child.as_wrapper() else {
                continue;
            };
            match wrapper.load() {
                Ok(_) => {}
                Err(HandlerError::Unavailable(unavailability)) => {
                    wrapper.mark_unavailable(unavailability);
                }
                Err(e) => {
                    tracing::error!(wrapper = %child.label(), error = %e, "Handler failed to load on startup");
                }
            }
        }
    }

    pub(crate) fn start_internal(&self) -> Result<()> {
        self.filter_start()?;
        self.load_on_startup();
        Ok(())
    }

    pub(crate) fn stop_internal(&self) {
        self.filter_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchConfig;
    use crate::filter::{filter_factory, FilterChain};
    use crate::http::{Request, Response};
    use std::sync::atomic::AtomicUsize;

    struct Counted {
        inits: Arc<AtomicUsize>,
        destroys: Arc<AtomicUsize>,
    }

    impl Filter for Counted {
        fn init(&self, config: &FilterConfig) -> std::result::Result<(), HandlerError> {
            assert_eq!(config.init_parameter("mode"), Some("first"));
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn do_filter(&self, req: &mut Request, resp: &mut Response, chain: &mut FilterChain) -> std::result::Result<(), HandlerError> {
            chain.do_filter(req, resp)
        }

        fn destroy(&self) {
            self.destroys.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_forbidden_paths() {
        let context = Container::context("/app", &DispatchConfig::default());
        let ctx = context.as_context().unwrap();
        assert!(ctx.is_forbidden("/WEB-INF"));
        assert!(ctx.is_forbidden("/web-inf/web.xml"));
        assert!(ctx.is_forbidden("/META-INF/MANIFEST.MF"));
        assert!(!ctx.is_forbidden("/WEB-INFO"));
        assert!(!ctx.is_forbidden("/index.html"));
    }

    #[test]
    fn test_filter_mapping_requires_definition() {
        let context = Container::context("/app", &DispatchConfig::default());
        let ctx = context.as_context().unwrap();
        let err = ctx
            .add_filter_mapping(FilterMapping::new("missing").url_pattern("/*"))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownFilter { .. }));
        assert!(ctx.filter_mappings().is_empty());
    }

    #[test]
    fn test_invalid_handler_pattern_rejected() {
        let context = Container::context("/app", &DispatchConfig::default());
        let ctx = context.as_context().unwrap();
        assert!(ctx.add_handler_mapping("no-slash", "w").is_err());
        assert!(ctx.handler_mappings().is_empty());
        ctx.add_handler_mapping("/ok", "w").unwrap();
        assert_eq!(ctx.find_handler_mapping("/ok").as_deref(), Some("w"));
        assert!(ctx.remove_handler_mapping("/ok"));
        assert!(!ctx.remove_handler_mapping("/ok"));
    }

    #[test]
    fn test_filters_follow_context_lifecycle() {
        let inits = Arc::new(AtomicUsize::new(0));
        let destroys = Arc::new(AtomicUsize::new(0));
        let (i, d) = (inits.clone(), destroys.clone());
        let factory = filter_factory(move || {
            let filter: Arc<dyn Filter> = Arc::new(Counted {
                inits: i.clone(),
                destroys: d.clone(),
            });
            Ok(filter)
        });

        let context = Container::context("/app", &DispatchConfig::default());
        let ctx = context.as_context().unwrap();
        ctx.add_filter_def(
            FilterDef::new("counted", factory)
                .with_param("mode", "first")
                .with_param("mode", "second"),
        )
        .unwrap();
        assert!(ctx.filter("counted").is_none());

        context.start().unwrap();
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert!(ctx.filter("counted").is_some());

        context.stop().unwrap();
        assert_eq!(destroys.load(Ordering::SeqCst), 1);
        assert!(ctx.filter("counted").is_none());
    }

    #[test]
    fn test_failing_filter_aborts_start() {
        let factory = filter_factory(|| Err(HandlerError::failed("no such class")));
        let context = Container::context("/app", &DispatchConfig::default());
        context
            .as_context()
            .unwrap()
            .add_filter_def(FilterDef::new("broken", factory))
            .unwrap();

        let err = context.start().unwrap_err();
        assert!(matches!(err, Error::FilterInit { .. }));
        assert!(!context.is_running());
    }
}
