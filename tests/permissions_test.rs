#[cfg(test)]
mod permissions_tests {
    use videodiary::permissions::{
        check_permission, check_permission_detailed, request_permission_in_background,
        PermissionStatus,
    };

    #[test]
    fn test_check_permission_is_consistent() {
        let first = check_permission();
        for _ in 0..5 {
            assert_eq!(check_permission(), first, "Permission status should be consistent");
        }
    }

    #[test]
    fn test_check_permission_concurrent() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(check_permission))
            .collect();

        let first = check_permission();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), first);
        }
    }

    #[test]
    fn test_detailed_matches_simple_status() {
        let info = check_permission_detailed();
        assert_eq!(info.status, check_permission());
        assert!(!info.message.is_empty());
        assert_eq!(info.is_granted(), info.status == PermissionStatus::Granted);
    }

    #[tokio::test]
    async fn test_background_request_never_panics() {
        let info = request_permission_in_background().await.unwrap();
        assert!(!info.message.is_empty());
    }
}
