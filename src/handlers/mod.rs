// handlers/mod.rs - request handlers, one module per API area
//
// Handlers extract and validate request data, call the matching service and
// wrap the result in the response envelope. Role checks happen in the route
// layer (see routes.rs); ownership checks happen in the services.

pub mod courses;
pub mod dashboard;
pub mod enrollments;
pub mod files;
pub mod health;
pub mod quizzes;
pub mod reviews;
pub mod subscriptions;
pub mod taxonomy;
pub mod users;
