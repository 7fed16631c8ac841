use crate::error::{ApiError, ApiResult};
use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use regex::Regex;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// 挑战求解器
///
/// 落地页内嵌一段JS，以`toNumbers("..")`形式给出十六进制的
/// 密钥、IV和密文，按出现顺序取用。解出的明文重新编码为小写
/// 十六进制，即上游校验的Cookie值。
pub struct ChallengeSolver;

impl ChallengeSolver {
    /// 从落地页HTML解出挑战Cookie值
    pub fn solve(page_html: &str) -> ApiResult<String> {
        let token_regex = Regex::new(r#"toNumbers\("([0-9a-fA-F]+)"\)"#).unwrap();

        let tokens: Vec<&str> = token_regex
            .captures_iter(page_html)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();

        if tokens.len() < 3 {
            return Err(ApiError::ChallengeParse(format!(
                "expected 3 hex tokens, found {}",
                tokens.len()
            )));
        }

        // 位置决定角色：第1个是密钥，第2个是IV，第3个是密文
        let key = Self::decode_hex(tokens[0], "key")?;
        let iv = Self::decode_hex(tokens[1], "iv")?;
        let ciphertext = Self::decode_hex(tokens[2], "ciphertext")?;

        let plaintext = Self::decrypt_cbc(&key, &iv, &ciphertext)?;
        Ok(hex::encode(plaintext))
    }

    fn decode_hex(token: &str, role: &str) -> ApiResult<Vec<u8>> {
        hex::decode(token)
            .map_err(|e| ApiError::ChallengeParse(format!("invalid hex for {}: {}", role, e)))
    }

    /// AES-128-CBC解密，不做额外的填充处理
    fn decrypt_cbc(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> ApiResult<Vec<u8>> {
        let decryptor = Aes128CbcDec::new_from_slices(key, iv)
            .map_err(|e| ApiError::ChallengeParse(format!("bad key/iv length: {}", e)))?;

        let mut buf = ciphertext.to_vec();
        let plaintext = decryptor
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|e| ApiError::ChallengeParse(format!("decrypt failed: {}", e)))?;

        Ok(plaintext.to_vec())
    }
}
