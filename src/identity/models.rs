//! Identity API data models

use serde::{Deserialize, Serialize};

/// A course the caller is enrolled in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseMembership {
    pub id: i64,
    pub fullname: String,
}

/// Authenticated caller as seen by the relay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
    pub username: String,
    pub fullname: String,
    /// Per-session anti-forgery key the browser must echo back
    pub sesskey: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub courses: Vec<CourseMembership>,
}

impl CallerIdentity {
    /// Course membership, if the caller may access `course_id`
    pub fn course(&self, course_id: i64) -> Option<&CourseMembership> {
        self.courses.iter().find(|c| c.id == course_id)
    }

    pub fn enrolled_course_ids(&self) -> Vec<i64> {
        self.courses.iter().map(|c| c.id).collect()
    }
}

/// Envelope returned by `GET /api/v1/session`
#[derive(Debug, Clone, Deserialize)]
pub struct SessionResponse {
    pub success: bool,
    pub data: CallerIdentity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_response_defaults() {
        let json = r#"{
            "success": true,
            "data": {
                "user_id": "7",
                "username": "student",
                "fullname": "Sam Student",
                "sesskey": "abc"
            }
        }"#;

        let response: SessionResponse = serde_json::from_str(json).unwrap();
        assert!(response.success);
        assert!(!response.data.is_admin);
        assert!(response.data.courses.is_empty());
    }

    #[test]
    fn test_course_lookup() {
        let caller = CallerIdentity {
            user_id: "7".into(),
            username: "student".into(),
            fullname: "Sam Student".into(),
            sesskey: "abc".into(),
            is_admin: false,
            courses: vec![
                CourseMembership { id: 3, fullname: "Biology".into() },
                CourseMembership { id: 9, fullname: "Chemistry".into() },
            ],
        };

        assert_eq!(caller.course(9).map(|c| c.fullname.as_str()), Some("Chemistry"));
        assert!(caller.course(4).is_none());
        assert_eq!(caller.enrolled_course_ids(), vec![3, 9]);
    }
}
