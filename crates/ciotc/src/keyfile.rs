use ciot_common::PrivateKey;
use std::fs;
use std::path::Path;

/// Loads a device private key stored as colon-separated hex, the form
/// `openssl ec -noout -text` prints under `priv:`. Whitespace and line
/// breaks are ignored, so the openssl block can be pasted as is.
///
/// # Errors
///
/// Returns an error if the file is readable by group or others, cannot be
/// read, or does not hold exactly 32 hex bytes.
pub fn load_private_key(path: &Path) -> anyhow::Result<PrivateKey> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let permissions = fs::metadata(path)?.permissions().mode();
        if permissions & 0o077 != 0 {
            anyhow::bail!(
                "key file {} has overly permissive permissions ({:o}), must be 0600",
                path.display(),
                permissions & 0o777
            );
        }
    }

    let text = fs::read_to_string(path)?;
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    PrivateKey::from_hex(&compact)
        .map_err(|e| anyhow::anyhow!("key file {}: {e}", path.display()))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const KEY_HEX: &str =
        "c9:af:a9:d8:45:ba:75:16:6b:5c:21:57:67:b1:d6:93:4e:50:c3:db:36:e8:9b:12:7b:8a:62:2b:12:0f:67:21";

    fn get_test_path() -> std::path::PathBuf {
        let random_suffix: u64 = rand::random();
        std::env::temp_dir().join(format!("ciotc_test_{random_suffix}"))
    }

    fn write_key(dir: &Path, contents: &str, mode: u32) -> std::path::PathBuf {
        fs::create_dir_all(dir).unwrap();
        let key_path = dir.join("device.key");
        fs::write(&key_path, contents).unwrap();
        let mut permissions = fs::metadata(&key_path).unwrap().permissions();
        permissions.set_mode(mode);
        fs::set_permissions(&key_path, permissions).unwrap();
        key_path
    }

    #[test]
    fn test_load_private_key_reads_single_line() {
        let test_dir = get_test_path();
        let key_path = write_key(&test_dir, &format!("{KEY_HEX}\n"), 0o600);
        let key = load_private_key(&key_path).unwrap();
        let expected = PrivateKey::from_hex(KEY_HEX).unwrap();
        assert_eq!(key.public_key(), expected.public_key());
        let _ = fs::remove_dir_all(&test_dir);
    }

    #[test]
    fn test_load_private_key_accepts_openssl_layout() {
        let test_dir = get_test_path();
        let wrapped = format!(
            "    {}\n    {}\n    {}\n",
            &KEY_HEX[..45],
            &KEY_HEX[45..90],
            &KEY_HEX[90..]
        );
        let key_path = write_key(&test_dir, &wrapped, 0o600);
        assert!(load_private_key(&key_path).is_ok());
        let _ = fs::remove_dir_all(&test_dir);
    }

    #[test]
    fn test_load_private_key_rejects_wrong_permissions() {
        let test_dir = get_test_path();
        let key_path = write_key(&test_dir, KEY_HEX, 0o644);
        let err_msg = load_private_key(&key_path).unwrap_err().to_string();
        assert!(err_msg.contains("overly permissive permissions"));
        let _ = fs::remove_dir_all(&test_dir);
    }

    #[test]
    fn test_load_private_key_rejects_short_key() {
        let test_dir = get_test_path();
        let key_path = write_key(&test_dir, &KEY_HEX[..92], 0o600);
        let err_msg = load_private_key(&key_path).unwrap_err().to_string();
        assert!(err_msg.contains("exactly 95"));
        let _ = fs::remove_dir_all(&test_dir);
    }

    #[test]
    fn test_load_private_key_missing_file() {
        let test_dir = get_test_path();
        assert!(load_private_key(&test_dir.join("absent.key")).is_err());
    }
}
