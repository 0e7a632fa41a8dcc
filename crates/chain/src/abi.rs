//! Contract interfaces used by the client.

pub const CAMPAIGN_ABI: &str = r#"[
  {
    "type": "function",
    "name": "getSummary",
    "stateMutability": "view",
    "inputs": [],
    "outputs": [
      { "name": "creator", "type": "address" },
      { "name": "goal", "type": "uint256" },
      { "name": "deadline", "type": "uint256" },
      { "name": "status", "type": "uint8" },
      { "name": "totalPledged", "type": "uint256" }
    ]
  },
  {
    "type": "function",
    "name": "metadataURI",
    "stateMutability": "view",
    "inputs": [],
    "outputs": [{ "name": "", "type": "string" }]
  },
  {
    "type": "function",
    "name": "pledges",
    "stateMutability": "view",
    "inputs": [{ "name": "backer", "type": "address" }],
    "outputs": [{ "name": "", "type": "uint256" }]
  },
  {
    "type": "function",
    "name": "pledge",
    "stateMutability": "payable",
    "inputs": [],
    "outputs": []
  },
  {
    "type": "function",
    "name": "unpledge",
    "stateMutability": "nonpayable",
    "inputs": [{ "name": "amount", "type": "uint256" }],
    "outputs": []
  },
  {
    "type": "function",
    "name": "refund",
    "stateMutability": "nonpayable",
    "inputs": [],
    "outputs": []
  },
  {
    "type": "function",
    "name": "finalize",
    "stateMutability": "nonpayable",
    "inputs": [],
    "outputs": []
  },
  {
    "type": "event",
    "name": "Pledged",
    "anonymous": false,
    "inputs": [
      { "name": "backer", "type": "address", "indexed": true },
      { "name": "amount", "type": "uint256", "indexed": false }
    ]
  }
]"#;

pub const FACTORY_ABI: &str = r#"[
  {
    "type": "function",
    "name": "createCampaign",
    "stateMutability": "nonpayable",
    "inputs": [
      { "name": "goal", "type": "uint256" },
      { "name": "deadline", "type": "uint256" },
      { "name": "metadataURI", "type": "string" }
    ],
    "outputs": [{ "name": "campaign", "type": "address" }]
  },
  {
    "type": "event",
    "name": "CampaignCreated",
    "anonymous": false,
    "inputs": [
      { "name": "campaign", "type": "address", "indexed": true }
    ]
  }
]"#;

pub const PLEDGED_EVENT: &str = "Pledged";
pub const CAMPAIGN_CREATED_EVENT: &str = "CampaignCreated";

#[cfg(test)]
mod tests {
    use super::*;
    use web3::ethabi::Contract;

    #[test]
    fn interfaces_parse() {
        let campaign = Contract::load(CAMPAIGN_ABI.as_bytes()).unwrap();
        for name in ["getSummary", "metadataURI", "pledges", "pledge", "unpledge", "refund", "finalize"] {
            assert!(campaign.function(name).is_ok(), "missing {name}");
        }
        assert!(campaign.event(PLEDGED_EVENT).is_ok());

        let factory = Contract::load(FACTORY_ABI.as_bytes()).unwrap();
        assert!(factory.function("createCampaign").is_ok());
        assert!(factory.event(CAMPAIGN_CREATED_EVENT).is_ok());
    }
}
