//! GraphQL request payloads.
//!
//! Each builder returns a complete `{"query": ..., "variables": ...}` body
//! ready to be posted by [`GraphQlClient`](crate::client::GraphQlClient).
//! The query documents request the fields the harvester stores; anything
//! else the service returns still passes through [`Item::extra`].

use serde_json::{json, Map, Value};

use crate::models::{ContentKind, Item};

/// Fields accepted by the `updateScenario` mutation input.
pub const UPDATE_FIELDS: &[&str] = &[
    "publicId",
    "title",
    "description",
    "tags",
    "prompt",
    "authorsNote",
    "quests",
    "musicTheme",
    "memory",
    "nsfw",
    "featured",
    "safeMode",
    "thirdPerson",
    "mode",
    "allowComments",
];

const SEARCH_QUERY: &str = r#"
query ($input: SearchInput) {
  user {
    id
    search(input: $input) {
      id
      publicId
      title
      description
      tags
      createdAt
      updatedAt
      ... on Scenario {
        options { publicId title createdAt }
      }
    }
  }
}
"#;

const SCENARIO_QUERY: &str = r#"
query ($publicId: String) {
  scenario(publicId: $publicId) {
    id
    publicId
    title
    description
    tags
    createdAt
    updatedAt
    memory
    authorsNote
    mode
    prompt
    quests
    worldInfo
    gameCode
    musicTheme
    nsfw
    featured
    safeMode
    thirdPerson
    allowComments
    options { publicId title createdAt }
  }
}
"#;

const ADVENTURE_QUERY: &str = r#"
query ($publicId: String) {
  adventure(publicId: $publicId) {
    id
    publicId
    title
    description
    tags
    createdAt
    updatedAt
    memory
    authorsNote
    worldInfo
    actions { id text type createdAt }
    undoneWindow { id text type createdAt }
  }
}
"#;

const LOGIN_MUTATION: &str = r#"
mutation ($identifier: String, $email: String, $password: String, $anonymousId: String) {
  login(identifier: $identifier, email: $email, password: $password, anonymousId: $anonymousId) {
    accessToken
  }
}
"#;

const CREATE_SCENARIO_MUTATION: &str = r#"
mutation {
  createScenario {
    id
    publicId
    title
    createdAt
  }
}
"#;

const UPDATE_SCENARIO_MUTATION: &str = r#"
mutation ($input: ScenarioInput) {
  updateScenario(input: $input) {
    id
    publicId
    title
    updatedAt
  }
}
"#;

/// Service-side content type for search.
fn content_type(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Story => "adventure",
        ContentKind::Scenario => "scenario",
    }
}

/// Server-side sort for search. Stories come longest first so an unpinned
/// harvest can stop at the first short one; scenarios come newest first.
fn sort_order(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Story => "actionCount",
        ContentKind::Scenario => "createdAt",
    }
}

/// Root field under `data` holding a record fetched by id.
pub fn record_field(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Story => "adventure",
        ContentKind::Scenario => "scenario",
    }
}

/// One page of the user's saved items: stories by action count, descending,
/// scenarios by creation date, newest first.
pub fn search(kind: ContentKind, term: &str, offset: usize) -> Value {
    json!({
        "query": SEARCH_QUERY,
        "variables": {
            "input": {
                "searchTerm": term,
                "saved": false,
                "trash": false,
                "contentType": content_type(kind),
                "sortOrder": sort_order(kind),
                "offset": offset
            }
        }
    })
}

pub fn get_by_id(kind: ContentKind, public_id: &str) -> Value {
    let query = match kind {
        ContentKind::Story => ADVENTURE_QUERY,
        ContentKind::Scenario => SCENARIO_QUERY,
    };
    json!({
        "query": query,
        "variables": { "publicId": public_id }
    })
}

/// The login mutation. The username is sent as both identifier and email.
pub fn login(username: &str, password: &str) -> Value {
    json!({
        "query": LOGIN_MUTATION,
        "variables": {
            "identifier": username,
            "email": username,
            "password": password
        }
    })
}

pub fn create_scenario() -> Value {
    json!({ "query": CREATE_SCENARIO_MUTATION, "variables": {} })
}

/// Copy `item` into an `updateScenario` input, keeping only
/// [`UPDATE_FIELDS`] and forcing `publicId` to `public_id`.
pub fn update_scenario(public_id: &str, item: &Item) -> Value {
    let mut input = Map::new();
    if let Value::Object(fields) = serde_json::to_value(item).unwrap_or(Value::Null) {
        for (key, value) in fields {
            if UPDATE_FIELDS.contains(&key.as_str()) {
                input.insert(key, value);
            }
        }
    }
    input.insert("publicId".to_string(), json!(public_id));

    json!({
        "query": UPDATE_SCENARIO_MUTATION,
        "variables": { "input": input }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_payload_carries_paging_input() {
        let payload = search(ContentKind::Story, "Castle", 40);
        let input = &payload["variables"]["input"];
        assert_eq!(input["searchTerm"], "Castle");
        assert_eq!(input["contentType"], "adventure");
        assert_eq!(input["offset"], 40);
        assert_eq!(input["saved"], false);
        assert_eq!(input["trash"], false);
        assert_eq!(input["sortOrder"], "actionCount");

        let scenarios = search(ContentKind::Scenario, "", 0);
        assert_eq!(scenarios["variables"]["input"]["contentType"], "scenario");
        assert_eq!(scenarios["variables"]["input"]["sortOrder"], "createdAt");
    }

    #[test]
    fn get_by_id_selects_root_field() {
        let story = get_by_id(ContentKind::Story, "abc");
        assert!(story["query"].as_str().unwrap().contains("adventure(publicId"));
        assert_eq!(story["variables"]["publicId"], "abc");

        let scenario = get_by_id(ContentKind::Scenario, "xyz");
        assert!(scenario["query"].as_str().unwrap().contains("scenario(publicId"));
    }

    #[test]
    fn login_sends_username_twice() {
        let payload = login("reader@example.com", "hunter2");
        let vars = &payload["variables"];
        assert_eq!(vars["identifier"], "reader@example.com");
        assert_eq!(vars["email"], "reader@example.com");
        assert_eq!(vars["password"], "hunter2");
    }

    #[test]
    fn update_scenario_whitelists_fields() {
        let mut item: Item = serde_json::from_value(json!({
            "id": "old-id",
            "publicId": "old-public",
            "title": "Castle",
            "prompt": "You enter.",
            "memory": "knight",
            "worldInfo": [{"keys": "king"}],
            "gameCode": "X1",
            "options": [{"publicId": "child", "title": "Left"}],
            "nsfw": false
        }))
        .unwrap();
        item.is_option = true;

        let payload = update_scenario("new-public", &item);
        let input = payload["variables"]["input"].as_object().unwrap();

        assert_eq!(input["publicId"], "new-public");
        assert_eq!(input["title"], "Castle");
        assert_eq!(input["prompt"], "You enter.");
        assert_eq!(input["memory"], "knight");
        assert_eq!(input["nsfw"], false);
        for dropped in ["id", "worldInfo", "gameCode", "options", "isOption"] {
            assert!(!input.contains_key(dropped), "{} should be dropped", dropped);
        }
    }
}
