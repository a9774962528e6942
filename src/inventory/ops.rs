//! Fully qualified operation names.
//!
//! The RPC transport dispatches on these and the HTTP gateway maps each
//! route to one of them, so both transports share one policy table.

pub const HEALTH_CHECK: &str = "/grpc.health.v1.Health/Check";

pub const LOGIN: &str = "/user.v1.UserService/Login";
pub const CREATE_USER: &str = "/user.v1.UserService/CreateUser";

pub const CREATE_LIBRARY: &str = "/library.v1.LibraryService/CreateLibrary";
pub const GET_LIBRARIES: &str = "/library.v1.LibraryService/GetLibraries";
pub const GET_LIBRARY: &str = "/library.v1.LibraryService/GetLibrary";
pub const DELETE_LIBRARY: &str = "/library.v1.LibraryService/DeleteLibrary";

pub const CREATE_CARD: &str = "/card.v1.CardService/CreateCard";
pub const GET_CARDS: &str = "/card.v1.CardService/GetCards";
pub const GET_CARD: &str = "/card.v1.CardService/GetCard";
pub const MOVE_CARD: &str = "/card.v1.CardService/MoveCard";
pub const DELETE_CARD: &str = "/card.v1.CardService/DeleteCard";

/// Every operation served by this process.
pub const ALL: &[&str] = &[
    HEALTH_CHECK,
    LOGIN,
    CREATE_USER,
    CREATE_LIBRARY,
    GET_LIBRARIES,
    GET_LIBRARY,
    DELETE_LIBRARY,
    CREATE_CARD,
    GET_CARDS,
    GET_CARD,
    MOVE_CARD,
    DELETE_CARD,
];
