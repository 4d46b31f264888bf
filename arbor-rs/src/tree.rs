//! The command tree: storage, matching and suggestion traversal.
//!
//! Every registered [`Command`] contributes one root-to-node path. Matching
//! walks the tree one component at a time:
//!
//! 1. A literal child whose name or alias equals the next token wins.
//! 2. Otherwise argument children are tried in registration order and the
//!    first successful parse wins. Two sibling arguments that accept
//!    overlapping input therefore resolve to whichever was registered first.
//! 3. When the input runs out, the node's own command runs. Optional argument
//!    children are bound to their defaults on the way down to it.
//!
//! Ambiguity is rejected when a command is inserted, never while matching.

use crate::command::Command;
use crate::component::{CommandComponent, ComponentKind};
use crate::context::CommandContext;
use crate::error::{CommandError, ParseError, RegistrationError};
use crate::input::CommandInput;
use crate::permission::{Permission, PermissionChecker};
use crate::suggestion::Suggestion;
use std::sync::Arc;

/// One node of the tree. The root has no component.
pub(crate) struct CommandNode<S> {
    component: Option<CommandComponent<S>>,
    children: Vec<CommandNode<S>>,
    command: Option<Arc<Command<S>>>,
    /// Union of the permissions of every command in this subtree.
    permission: Permission<S>,
}

impl<S> CommandNode<S> {
    fn root() -> Self {
        Self::new(None)
    }

    fn new(component: Option<CommandComponent<S>>) -> Self {
        Self {
            component,
            children: Vec::new(),
            command: None,
            permission: Permission::Empty,
        }
    }

    fn label(&self) -> String {
        self.component
            .as_ref()
            .map(CommandComponent::syntax)
            .unwrap_or_default()
    }

    fn name(&self) -> &str {
        self.component
            .as_ref()
            .map(CommandComponent::name)
            .unwrap_or_default()
    }

    fn is_literal(&self) -> bool {
        self.component.as_ref().is_some_and(CommandComponent::is_literal)
    }

    /// Whether this is a literal answering to `token`.
    fn accepts(&self, token: &str) -> bool {
        self.component
            .as_ref()
            .is_some_and(|c| c.matches_literal(token))
    }

    fn is_optional(&self) -> bool {
        self.component
            .as_ref()
            .is_some_and(CommandComponent::is_optional)
    }

    fn arguments(&self) -> impl Iterator<Item = &CommandNode<S>> {
        self.children.iter().filter(|child| !child.is_literal())
    }

    fn permitted(&self, sender: &S, checker: &dyn PermissionChecker<S>) -> bool {
        self.permission.test(sender, checker)
    }

    /// Commands that would run if the input ended at this node: its own, plus
    /// any reachable through chains of omitted optional arguments.
    fn empty_input_terminals(&self) -> usize {
        usize::from(self.command.is_some())
            + self
                .children
                .iter()
                .filter(|child| child.is_optional())
                .map(CommandNode::empty_input_terminals)
                .sum::<usize>()
    }

    fn collect_commands(&self, out: &mut Vec<Arc<Command<S>>>) {
        if let Some(command) = &self.command {
            out.push(Arc::clone(command));
        }
        for child in &self.children {
            child.collect_commands(out);
        }
    }

    /// Recompute subtree permissions bottom-up.
    fn refresh_permission(&mut self) -> Permission<S> {
        let mut union: Option<Permission<S>> = self
            .command
            .as_ref()
            .map(|command| command.permission().clone());
        for child in &mut self.children {
            let child_permission = child.refresh_permission();
            union = Some(match union {
                Some(acc) => acc.or(child_permission),
                None => child_permission,
            });
        }
        self.permission = union.unwrap_or_default();
        self.permission.clone()
    }

    /// Index of the child to descend into for `component`, inserting a new
    /// child when no compatible one exists.
    fn child_for(
        &mut self,
        component: &CommandComponent<S>,
        path: &[String],
    ) -> Result<usize, RegistrationError> {
        match component.kind() {
            ComponentKind::Literal { .. } => self.literal_child(component, path),
            ComponentKind::Argument(_) => self.argument_child(component, path),
        }
    }

    fn literal_child(
        &mut self,
        component: &CommandComponent<S>,
        path: &[String],
    ) -> Result<usize, RegistrationError> {
        let existing = self
            .children
            .iter()
            .position(|child| child.is_literal() && child.name() == component.name());

        for (index, child) in self.children.iter().enumerate() {
            if Some(index) == existing {
                continue;
            }
            if let Some(clash) = component.literal_names().find(|name| child.accepts(name)) {
                return Err(RegistrationError::Ambiguous {
                    path: path.join(" "),
                    reason: format!("'{clash}' is already used by literal '{}'", child.name()),
                });
            }
        }

        match existing {
            Some(index) => {
                let target = &self.children[index];
                let added: Vec<String> = component
                    .aliases()
                    .iter()
                    .filter(|alias| !target.accepts(alias))
                    .cloned()
                    .collect();
                if let (false, Some(current)) = (added.is_empty(), &target.component) {
                    let aliases = current.aliases().iter().cloned().chain(added);
                    let mut merged = CommandComponent::literal_with_aliases(current.name(), aliases);
                    if let Some(description) = current.description() {
                        merged = merged.with_description(description);
                    }
                    self.children[index].component = Some(merged);
                }
                Ok(index)
            }
            None => {
                self.children.push(CommandNode::new(Some(component.clone())));
                Ok(self.children.len() - 1)
            }
        }
    }

    fn argument_child(
        &mut self,
        component: &CommandComponent<S>,
        path: &[String],
    ) -> Result<usize, RegistrationError> {
        let Some(argument) = component.as_argument() else {
            return Err(RegistrationError::Ambiguous {
                path: path.join(" "),
                reason: format!("'{}' is not an argument", component.name()),
            });
        };

        for (index, child) in self.children.iter().enumerate() {
            let Some(existing) = child.component.as_ref().and_then(|c| c.as_argument()) else {
                continue;
            };
            if child.name() == component.name() {
                let compatible = existing.parser().value_type() == argument.parser().value_type()
                    && existing.is_optional() == argument.is_optional()
                    && existing.parser().is_variable_arity() == argument.parser().is_variable_arity();
                if compatible {
                    return Ok(index);
                }
                return Err(RegistrationError::Ambiguous {
                    path: path.join(" "),
                    reason: format!(
                        "argument '{}' is already registered with a different type or optionality",
                        component.name()
                    ),
                });
            }
        }

        if let Some(greedy) = self
            .arguments()
            .find(|child| child.component.as_ref().is_some_and(CommandComponent::is_variable_arity))
        {
            return Err(RegistrationError::VariableArityNotLast {
                component: greedy.name().to_string(),
            });
        }

        self.children.push(CommandNode::new(Some(component.clone())));
        Ok(self.children.len() - 1)
    }

    fn syntaxes(&self) -> String {
        let mut commands = Vec::new();
        self.collect_commands(&mut commands);
        commands
            .iter()
            .map(|command| command.syntax())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl<S> Clone for CommandNode<S> {
    fn clone(&self) -> Self {
        Self {
            component: self.component.clone(),
            children: self.children.clone(),
            command: self.command.clone(),
            permission: self.permission.clone(),
        }
    }
}

// ============================================================================
// Tree
// ============================================================================

/// Suggestions gathered for one request, before filtering.
pub(crate) struct SuggestionSet {
    /// The token being completed.
    pub(crate) partial: String,
    pub(crate) candidates: Vec<Suggestion>,
}

impl SuggestionSet {
    fn empty() -> Self {
        Self {
            partial: String::new(),
            candidates: Vec::new(),
        }
    }
}

pub(crate) struct CommandTree<S> {
    root: CommandNode<S>,
}

impl<S: 'static> CommandTree<S> {
    pub(crate) fn new() -> Self {
        Self {
            root: CommandNode::root(),
        }
    }

    /// Insert `command`. On error `self` may be partially modified, so callers
    /// insert into a copy and keep the original on failure.
    pub(crate) fn insert(&mut self, command: Arc<Command<S>>) -> Result<(), RegistrationError> {
        let mut path: Vec<String> = Vec::new();
        let mut indices = Vec::with_capacity(command.components().len());
        let mut node = &mut self.root;
        for component in command.components() {
            path.push(component.syntax());
            let index = node.child_for(component, &path)?;
            indices.push(index);
            node = &mut node.children[index];
        }

        if let Some(existing) = &node.command {
            return Err(RegistrationError::Ambiguous {
                path: path.join(" "),
                reason: format!("'{}' is already registered here", existing.syntax()),
            });
        }
        node.command = Some(command);

        self.root.refresh_permission();
        self.check_terminals(&indices, &path)
    }

    fn check_terminals(&self, indices: &[usize], path: &[String]) -> Result<(), RegistrationError> {
        let mut node = &self.root;
        for (depth, &index) in indices.iter().enumerate() {
            node = &node.children[index];
            if node.empty_input_terminals() > 1 {
                return Err(RegistrationError::Ambiguous {
                    path: path[..=depth].join(" "),
                    reason: "more than one command would run when the input ends here"
                        .to_string(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn commands(&self) -> Vec<Arc<Command<S>>> {
        let mut out = Vec::new();
        self.root.collect_commands(&mut out);
        out
    }

    /// Match `input` against the tree, binding argument values into
    /// `context`. Returns the command to run.
    pub(crate) async fn resolve(
        &self,
        context: &mut CommandContext<S>,
        input: &mut CommandInput,
        checker: &dyn PermissionChecker<S>,
    ) -> Result<Arc<Command<S>>, CommandError> {
        let mut node = &self.root;
        let mut path: Vec<String> = Vec::new();

        loop {
            if input.is_empty() {
                node = self.finish(node, &mut path, context, checker).await?;
                if let Some(command) = &node.command {
                    return Ok(Arc::clone(command));
                }
                continue;
            }

            let token = input.peek_string().to_string();

            if let Some(child) = node.children.iter().find(|child| child.accepts(&token)) {
                path.push(child.label());
                if !child.permitted(context.sender(), checker) {
                    return Err(CommandError::NoPermission {
                        path,
                        permission: child.permission.to_string(),
                    });
                }
                input.read_string();
                node = child;
                continue;
            }

            let mut first_failure: Option<(String, ParseError)> = None;
            let mut denied: Option<&CommandNode<S>> = None;
            let mut matched: Option<&CommandNode<S>> = None;
            for child in node.arguments() {
                let Some(argument) = child.component.as_ref().and_then(|c| c.as_argument()) else {
                    continue;
                };
                if !child.permitted(context.sender(), checker) {
                    denied.get_or_insert(child);
                    continue;
                }
                match argument.parser().parse(context, input).await {
                    Ok(value) => {
                        context.bind(child.name(), value);
                        matched = Some(child);
                        break;
                    }
                    Err(err) => {
                        first_failure.get_or_insert_with(|| (child.name().to_string(), err));
                    }
                }
            }

            if let Some(child) = matched {
                path.push(child.label());
                node = child;
                continue;
            }
            if let Some((component, source)) = first_failure {
                return Err(CommandError::ArgumentParse { component, source });
            }
            if let Some(child) = denied {
                path.push(child.label());
                return Err(CommandError::NoPermission {
                    path,
                    permission: child.permission.to_string(),
                });
            }
            return Err(CommandError::NoSuchCommand { input: token, path });
        }
    }

    /// Input is exhausted at `node`: run its command, or step into an omitted
    /// optional argument.
    async fn finish<'n>(
        &'n self,
        node: &'n CommandNode<S>,
        path: &mut Vec<String>,
        context: &mut CommandContext<S>,
        checker: &dyn PermissionChecker<S>,
    ) -> Result<&'n CommandNode<S>, CommandError> {
        if let Some(command) = &node.command {
            if !command.permission().test(context.sender(), checker) {
                return Err(CommandError::NoPermission {
                    path: path.clone(),
                    permission: command.permission().to_string(),
                });
            }
            return Ok(node);
        }

        if let Some(child) = node.arguments().find(|child| child.is_optional()) {
            path.push(child.label());
            if !child.permitted(context.sender(), checker) {
                return Err(CommandError::NoPermission {
                    path: path.clone(),
                    permission: child.permission.to_string(),
                });
            }
            let argument = child.component.as_ref().and_then(|c| c.as_argument());
            if let Some(argument) = argument {
                if let Some(default) = argument.default_value() {
                    let value = default
                        .resolve(argument.parser(), context)
                        .await
                        .map_err(|source| CommandError::ArgumentParse {
                            component: child.name().to_string(),
                            source,
                        })?;
                    context.bind(child.name(), value);
                }
            }
            return Ok(child);
        }

        if let Some(child) = node.arguments().next() {
            return Err(CommandError::ArgumentParse {
                component: child.name().to_string(),
                source: ParseError::NoInputProvided,
            });
        }

        if path.is_empty() {
            return Err(CommandError::NoSuchCommand {
                input: String::new(),
                path: Vec::new(),
            });
        }
        Err(CommandError::InvalidSyntax {
            syntax: node.syntaxes(),
        })
    }

    /// Gather completions for the token the input ends in.
    pub(crate) async fn suggest(
        &self,
        context: &mut CommandContext<S>,
        input: &mut CommandInput,
        checker: &dyn PermissionChecker<S>,
    ) -> SuggestionSet {
        let mut node = &self.root;

        loop {
            input.skip_whitespace();
            if input.is_last_token() {
                return self.collect(node, context, input, checker).await;
            }

            let token = input.peek_string().to_string();
            if let Some(child) = node.children.iter().find(|child| child.accepts(&token)) {
                if !child.permitted(context.sender(), checker) {
                    return SuggestionSet::empty();
                }
                input.read_string();
                node = child;
                continue;
            }

            let mut matched = None;
            for child in node.arguments() {
                let Some(argument) = child.component.as_ref().and_then(|c| c.as_argument()) else {
                    continue;
                };
                if !child.permitted(context.sender(), checker) {
                    continue;
                }
                let start = input.cursor();
                let Ok(value) = argument.parser().parse(context, input).await else {
                    continue;
                };
                if input.remaining_length() == 0 {
                    // The argument swallowed the rest, so it is still being typed.
                    input.restore(start);
                    return self.collect_argument(child, context, input).await;
                }
                context.bind(child.name(), value);
                matched = Some(child);
                break;
            }

            match matched {
                Some(child) => node = child,
                None => return SuggestionSet::empty(),
            }
        }
    }

    async fn collect(
        &self,
        node: &CommandNode<S>,
        context: &CommandContext<S>,
        input: &CommandInput,
        checker: &dyn PermissionChecker<S>,
    ) -> SuggestionSet {
        let partial = input.last_remaining_token().to_string();
        let range = replace_range(input, &partial);
        let mut candidates = Vec::new();

        for child in &node.children {
            if !child.permitted(context.sender(), checker) {
                continue;
            }
            let Some(component) = &child.component else {
                continue;
            };
            match component.kind() {
                ComponentKind::Literal { .. } => candidates.extend(
                    component
                        .literal_names()
                        .map(|name| Suggestion::simple(name).with_replace(range.clone())),
                ),
                ComponentKind::Argument(_) => {
                    candidates.extend(self.collect_argument(child, context, input).await.candidates)
                }
            }
        }

        SuggestionSet {
            partial,
            candidates,
        }
    }

    async fn collect_argument(
        &self,
        child: &CommandNode<S>,
        context: &CommandContext<S>,
        input: &CommandInput,
    ) -> SuggestionSet {
        let partial = input.last_remaining_token().to_string();
        let range = replace_range(input, &partial);
        let Some(argument) = child.component.as_ref().and_then(|c| c.as_argument()) else {
            return SuggestionSet::empty();
        };
        let raw = match argument.suggestion_override() {
            Some(provider) => provider.suggestions(context, input).await,
            None => argument.parser().suggestions(context, input).await,
        };
        let candidates = raw
            .into_iter()
            .map(|suggestion| match suggestion.replace {
                Some(_) => suggestion,
                None => suggestion.with_replace(range.clone()),
            })
            .collect();
        SuggestionSet {
            partial,
            candidates,
        }
    }
}

impl<S> Clone for CommandTree<S> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<S: 'static> Default for CommandTree<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn replace_range(input: &CommandInput, partial: &str) -> std::ops::Range<usize> {
    let end = input.input().len();
    end - partial.len()..end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::HandlerResult;
    use crate::parser::{IntegerParser, StringParser};
    use crate::permission::AllowAll;

    async fn noop(_ctx: CommandContext<()>) -> HandlerResult {
        Ok(())
    }

    fn command(builder: crate::command::CommandBuilder<()>) -> Arc<Command<()>> {
        Arc::new(builder.handler(noop).build().unwrap())
    }

    fn tree(commands: Vec<Arc<Command<()>>>) -> CommandTree<()> {
        let mut tree = CommandTree::new();
        for c in commands {
            tree.insert(c).unwrap();
        }
        tree
    }

    async fn resolve(
        tree: &CommandTree<()>,
        raw: &str,
    ) -> (Result<Arc<Command<()>>, CommandError>, CommandContext<()>) {
        let mut ctx = CommandContext::new(Arc::new(()), raw);
        let mut input = CommandInput::new(raw);
        let result = tree.resolve(&mut ctx, &mut input, &AllowAll).await;
        (result, ctx)
    }

    async fn suggest(tree: &CommandTree<()>, raw: &str) -> Vec<String> {
        let mut ctx = CommandContext::new(Arc::new(()), raw);
        let mut input = CommandInput::new(raw);
        let set = tree.suggest(&mut ctx, &mut input, &AllowAll).await;
        crate::suggestion::process(set.candidates, &set.partial, false, None)
            .into_iter()
            .map(|s| s.text)
            .collect()
    }

    fn give() -> Arc<Command<()>> {
        command(
            Command::builder("give")
                .required("item", StringParser::single())
                .required("amount", IntegerParser::new()),
        )
    }

    #[tokio::test]
    async fn test_resolves_give() {
        let tree = tree(vec![give()]);
        let (result, ctx) = resolve(&tree, "give stone 5").await;
        assert_eq!(result.unwrap().name(), "give");
        assert_eq!(ctx.get::<String>("item").map(String::as_str), Some("stone"));
        assert_eq!(ctx.get::<i64>("amount"), Some(&5));
        assert_eq!(ctx.argument_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_and_invalid_amount() {
        let tree = tree(vec![give()]);
        match resolve(&tree, "give stone").await.0 {
            Err(CommandError::ArgumentParse { component, source }) => {
                assert_eq!(component, "amount");
                assert!(matches!(source, ParseError::NoInputProvided));
            }
            other => panic!("unexpected: {other:?}"),
        }
        match resolve(&tree, "give stone five").await.0 {
            Err(CommandError::ArgumentParse { component, .. }) => assert_eq!(component, "amount"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_such_command_reports_deepest_node() {
        let tree = tree(vec![command(Command::builder("foo").literal("bar"))]);
        match resolve(&tree, "foo qux").await.0 {
            Err(CommandError::NoSuchCommand { input, path }) => {
                assert_eq!(input, "qux");
                assert_eq!(path, vec!["foo"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            resolve(&tree, "").await.0,
            Err(CommandError::NoSuchCommand { .. })
        ));
        assert!(matches!(
            resolve(&tree, "foo").await.0,
            Err(CommandError::InvalidSyntax { .. })
        ));
    }

    #[tokio::test]
    async fn test_first_registered_argument_wins() {
        let tree = tree(vec![
            command(Command::builder("set").required("number", IntegerParser::new())),
            command(Command::builder("set").required("text", StringParser::single()).literal("now")),
        ]);
        let (_, ctx) = resolve(&tree, "set 5").await;
        assert_eq!(ctx.get::<i64>("number"), Some(&5));

        let (result, ctx) = resolve(&tree, "set five now").await;
        assert_eq!(result.unwrap().syntax(), "set <text> now");
        assert_eq!(ctx.get::<String>("text").map(String::as_str), Some("five"));
    }

    #[test]
    fn test_duplicate_terminal_is_ambiguous() {
        let mut tree = tree(vec![give()]);
        let err = tree.insert(give()).unwrap_err();
        assert!(matches!(err, RegistrationError::Ambiguous { .. }));
    }

    #[test]
    fn test_optional_chain_terminal_is_ambiguous() {
        let mut tree = tree(vec![command(Command::builder("spawn"))]);
        let err = tree
            .insert(command(
                Command::builder("spawn").optional("mob", StringParser::single()),
            ))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Ambiguous { .. }));
    }

    #[test]
    fn test_alias_clash_is_ambiguous() {
        let mut tree = tree(vec![command(Command::builder("teleport").alias("tp"))]);
        let err = tree
            .insert(command(Command::builder("tp")))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Ambiguous { .. }));
    }

    #[test]
    fn test_argument_after_greedy_sibling_rejected() {
        let mut tree = tree(vec![command(
            Command::builder("say").required("message", StringParser::greedy()),
        )]);
        let err = tree
            .insert(command(
                Command::builder("say").required("count", IntegerParser::new()),
            ))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::VariableArityNotLast { component } if component == "message"));
    }

    #[tokio::test]
    async fn test_suggest_literals() {
        let tree = tree(vec![
            command(Command::builder("foo").literal("bar")),
            command(Command::builder("foo").literal("baz")),
        ]);
        assert_eq!(suggest(&tree, "foo ").await, vec!["bar", "baz"]);
        assert_eq!(suggest(&tree, "foo b").await, vec!["bar", "baz"]);
        assert_eq!(suggest(&tree, "foo ba").await, vec!["bar", "baz"]);
        assert_eq!(suggest(&tree, "foo bar").await, vec!["bar"]);
        assert!(suggest(&tree, "foo bar ").await.is_empty());
        assert_eq!(suggest(&tree, "f").await, vec!["foo"]);
    }

    #[tokio::test]
    async fn test_suggest_sets_replace_range() {
        let tree = tree(vec![command(Command::builder("foo").literal("bar"))]);
        let mut ctx = CommandContext::new(Arc::new(()), "foo ba");
        let mut input = CommandInput::new("foo ba");
        let set = tree.suggest(&mut ctx, &mut input, &AllowAll).await;
        assert_eq!(set.partial, "ba");
        assert_eq!(set.candidates[0].replace, Some(4..6));
    }

    #[tokio::test]
    async fn test_suggest_through_arguments() {
        let tree = tree(vec![command(
            Command::builder("give")
                .required("item", StringParser::single())
                .required("amount", IntegerParser::range(1, 20)),
        )]);
        assert_eq!(
            suggest(&tree, "give stone 1").await,
            vec!["1", "10", "11", "12", "13", "14", "15", "16", "17", "18", "19"]
        );
    }
}
