// Handler fixture for the integration tests. Placed at src/handlers/users.rs of a
// throwaway project; never compiled.

/// List users
///
/// Returns every user, newest first.
///
/// @group Users
/// Manage the people using the shop.
/// @queryParam page integer Page number. Example: 1
/// @queryParam filter[name] string Only users with this name.
/// @response 200 {"data": [{"id": 1, "name": "Ada", "active": true}]}
/// @responseField id The user ID.
/// @responseField active Whether the account can log in.
pub async fn index() {}

/// Show a user
///
/// @group Users
/// @subgroup Profiles
/// @urlParam id integer required The user ID. Example: 4
/// @response 200 {"id": 4, "name": "Ada"}
/// @response 404 scenario="missing" {"message": "No such user"}
pub async fn show() {}

/// Update a user
///
/// @group Users
/// @subgroup Profiles
/// @bodyParam name string required New display name. Example: Ada
/// @bodyParam address.city string City. Example: London
pub async fn update() {}

/// @hideFromAPIDocumentation
pub async fn internal() {}
