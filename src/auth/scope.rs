//! Requested scope lists and the historical alias table.

// self
use crate::_prelude::*;

/// Short names accepted in place of full scope URLs.
pub const SCOPE_ALIASES: &[(&str, &str)] = &[
	("BUZZ", "https://www.googleapis.com/auth/buzz"),
	("BUZZ_READONLY", "https://www.googleapis.com/auth/buzz.readonly"),
	("LATITUDE", "https://www.googleapis.com/auth/latitude"),
	("PICASAWEB", "http://picasaweb.google.com/data/"),
];

/// Errors emitted when validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Ordered, de-duplicated list of scopes as the user requested them.
///
/// Unlike a set, order is preserved: providers see scopes in the order they were given.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeList(Vec<String>);
impl ScopeList {
	/// Builds a list, expanding aliases such as `BUZZ` into their URLs.
	///
	/// Each input may itself hold several comma-separated scopes.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut list = Vec::new();

		for raw in scopes {
			for piece in raw.as_ref().split(',') {
				let piece = piece.trim();

				if piece.is_empty() {
					return Err(ScopeValidationError::Empty);
				}
				if piece.chars().any(char::is_whitespace) {
					return Err(ScopeValidationError::ContainsWhitespace { scope: piece.into() });
				}

				let scope = expand_alias(piece).to_owned();

				if !list.contains(&scope) {
					list.push(scope);
				}
			}
		}

		Ok(Self(list))
	}

	/// Returns true if no scopes were requested.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterator over the expanded scopes.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Space-delimited form sent to providers, or `None` when empty.
	pub fn joined(&self) -> Option<String> {
		if self.0.is_empty() { None } else { Some(self.0.join(" ")) }
	}
}

/// Resolves a scope alias, returning the input unchanged when it is not one.
pub fn expand_alias(scope: &str) -> &str {
	SCOPE_ALIASES
		.iter()
		.find_map(|(alias, url)| (*alias == scope).then_some(*url))
		.unwrap_or(scope)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn aliases_expand_and_order_is_kept() {
		let scopes = ScopeList::new(["LATITUDE", "https://example.com/b,BUZZ", "LATITUDE"])
			.expect("Scope fixture should be valid.");

		assert_eq!(
			scopes.joined().as_deref(),
			Some(
				"https://www.googleapis.com/auth/latitude https://example.com/b https://www.googleapis.com/auth/buzz"
			),
		);
	}

	#[test]
	fn invalid_entries_are_rejected() {
		assert_eq!(ScopeList::new(["a,,b"]), Err(ScopeValidationError::Empty));
		assert!(matches!(
			ScopeList::new(["has space"]),
			Err(ScopeValidationError::ContainsWhitespace { .. })
		));
	}

	#[test]
	fn empty_list_has_no_joined_form() {
		let scopes = ScopeList::new(Vec::<String>::new()).expect("Empty scope list should be valid.");

		assert!(scopes.is_empty());
		assert_eq!(scopes.joined(), None);
		assert_eq!(expand_alias("PICASAWEB"), "http://picasaweb.google.com/data/");
	}
}
